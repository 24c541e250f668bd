use mintflow_common::error::{ClassifiedError, ErrorKind};
use mintflow_domain::constants::{LOGIN_PATH, LOGOUT_PATH, ME_PATH};
use mintflow_domain::types::{LoginRequest, TokenResponse, UserProfile};
use mintflow_domain::MintFlowError;
use tracing::{debug, info, instrument};

use super::MintFlowApi;
use crate::api::{Credentials, RequestDescriptor};
use crate::observability::record_classified_error;
use crate::query::{QueryHandle, QueryKey};

impl MintFlowApi {
    /// Exchange email and password for a token pair and start a session.
    ///
    /// Cached data from any previous session is dropped first.
    ///
    /// # Errors
    /// The classified login failure, or an `UnknownError` if the tokens could
    /// not be stored.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, login: &LoginRequest) -> Result<(), ClassifiedError> {
        let request = RequestDescriptor::post(LOGIN_PATH).json(login)?.unauthenticated();
        let tokens: TokenResponse = self.executor.execute_json(&request).await?;

        self.queries.clear();
        let credentials =
            Credentials { access_token: Some(tokens.access_token), refresh_token: tokens.refresh_token };
        self.executor.coordinator().install(credentials).map_err(|err| {
            let err = ClassifiedError::new(
                ErrorKind::UnknownError,
                format!("could not store credentials: {err}"),
                false,
            );
            record_classified_error(&err, "sign in");
            err
        })?;
        info!("signed in");
        Ok(())
    }

    /// Tell the API the session is over, then forget it locally.
    ///
    /// The logout call is best-effort; local state is cleared even when it
    /// fails.
    ///
    /// # Errors
    /// Fails only if the stored credentials could not be removed.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<(), MintFlowError> {
        if self.executor.coordinator().credentials().is_authenticated() {
            if let Err(err) = self.executor.execute(&RequestDescriptor::post(LOGOUT_PATH)).await {
                debug!(kind = %err.kind, "logout call failed, clearing local session anyway");
            }
        }

        self.queries.clear();
        self.executor.coordinator().sign_out()?;
        info!("signed out");
        Ok(())
    }

    /// Profile of the signed-in user.
    pub fn me(&self) -> QueryHandle<UserProfile> {
        self.watch(QueryKey::new("auth.me"), RequestDescriptor::get(ME_PATH))
    }
}
