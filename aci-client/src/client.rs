use crate::config::ApicConfig;
use crate::error::AciResult;
use crate::session::Session;

/// High-level extraction client for one fabric site.
///
/// Every operation is a blocking sequence of one or more REST calls through
/// the owned [`Session`]; nested calls happen in a fixed order because later
/// ones depend on identifiers produced by earlier ones. Errors propagate
/// unhandled: a failing sub-query aborts the whole operation in progress.
pub struct AciClient {
    pub(crate) session: Session
}

impl AciClient {
    pub fn new(config: ApicConfig) -> AciResult<Self> {
        Ok(Self {
            session: Session::new(config)?
        })
    }

    pub(crate) fn site(&self) -> &str {
        &self.session.config().site
    }
}
