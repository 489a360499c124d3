//! `calls.*` methods

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::api::VkApi;
use crate::error::Result;
use crate::params::VkParameters;

/// Parameters of `calls.start`.
#[derive(Debug, Clone, Default)]
pub struct CallsStartParams {
    /// Start the call on behalf of this community instead of the user.
    pub group_id: Option<u64>,
}

impl CallsStartParams {
    fn into_parameters(self) -> VkParameters {
        let mut params = VkParameters::new();
        params.insert_opt("group_id", self.group_id);
        params
    }
}

/// Result of `calls.start`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallStartResult {
    pub join_link: String,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub ok_join_link: Option<String>,
}

/// Parameters of `calls.forceFinish`.
#[derive(Debug, Clone)]
pub struct CallsForceFinishParams {
    pub call_id: String,
}

pub struct CallsCategory<'a> {
    api: &'a VkApi,
}

impl VkApi {
    pub fn calls(&self) -> CallsCategory<'_> {
        CallsCategory { api: self }
    }
}

impl CallsCategory<'_> {
    /// Create a new call and return its join link.
    pub async fn start(
        &self,
        params: CallsStartParams,
        cancel: &CancellationToken,
    ) -> Result<CallStartResult> {
        self.api
            .call_typed("calls.start", params.into_parameters(), false, Vec::new(), cancel)
            .await
    }

    /// End a call for every participant.
    pub async fn force_finish(
        &self,
        params: CallsForceFinishParams,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let params = VkParameters::new().with("call_id", params.call_id);
        self.api
            .call("calls.forceFinish", params, false, cancel)
            .await?
            .as_bool()
    }
}
