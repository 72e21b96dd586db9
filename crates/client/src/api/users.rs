//! Account lookup and profile updates.

use reqwest::Method;
use shopfront_core::{Email, User, UserUpdate};
use tracing::instrument;

use super::ApiClient;
use crate::error::ClientError;

impl ApiClient {
    /// Look up an account by email.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if no account uses the email, or
    /// another error if the API request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn get_user_by_email(&self, email: &Email) -> Result<User, ClientError> {
        let mut url = self.endpoint(&["users"])?;
        url.query_pairs_mut().append_pair("email", email.as_str());

        let builder = self.request(Method::GET, url).await;
        self.send_json(builder).await
    }

    /// Update the signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Authentication` without a valid bearer token, or
    /// another error if the API request fails.
    #[instrument(skip(self, update))]
    pub async fn update_user(&self, update: &UserUpdate) -> Result<User, ClientError> {
        let url = self.endpoint(&["users"])?;
        let builder = self.request(Method::PUT, url).await.json(update);
        self.send_json(builder).await
    }
}
