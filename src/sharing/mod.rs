use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Private,
    Friends,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum UpdateErrorKind {
    Network,
    Unauthorized,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("visibility update failed: {kind}")]
    Failed { kind: UpdateErrorKind },
}

#[async_trait]
pub trait VisibilityService: Send + Sync {
    async fn update_visibility(
        &self,
        journal_id: &str,
        visibility: Visibility,
    ) -> Result<(), UpdateErrorKind>;
}

/// Share settings of one journal as the owner sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareStatus {
    journal_id: String,
    visibility: Visibility,
    is_saving: bool,
    last_error: Option<UpdateError>,
}

impl ShareStatus {
    pub fn new(journal_id: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            journal_id: journal_id.into(),
            visibility,
            is_saving: false,
            last_error: None,
        }
    }

    pub fn journal_id(&self) -> &str {
        &self.journal_id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_saving(&self) -> bool {
        self.is_saving
    }

    pub fn last_error(&self) -> Option<&UpdateError> {
        self.last_error.as_ref()
    }

    /// Pushes a new visibility to the service. On failure the previous
    /// visibility stays, `is_saving` clears and the error is returned.
    ///
    /// The exclusive borrow rules out overlapping saves. If the returned
    /// future is dropped before the service answers, `is_saving` still clears
    /// and the visibility is left as it was.
    pub async fn update<S>(&mut self, service: &S, visibility: Visibility) -> Result<(), UpdateError>
    where
        S: VisibilityService + ?Sized,
    {
        self.last_error = None;
        let saving = SavingFlag::raise(&mut self.is_saving);
        let outcome = service.update_visibility(&self.journal_id, visibility).await;
        drop(saving);
        match outcome {
            Ok(()) => {
                tracing::info!(journal = %self.journal_id, %visibility, "visibility updated");
                self.visibility = visibility;
                Ok(())
            }
            Err(kind) => {
                tracing::warn!(journal = %self.journal_id, %visibility, %kind, "visibility update failed");
                let err = UpdateError::Failed { kind };
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }
}

/// Holds `is_saving` up until dropped, on every exit path.
struct SavingFlag<'a>(&'a mut bool);

impl<'a> SavingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for SavingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}
