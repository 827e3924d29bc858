use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::models::{
    AccountRequest, BookList, CreatedUser, IsbnEntry, Profile, ReservationRequest, TokenResponse,
};

const ACCOUNT_USER: &str = "Account/v1/User";
const ACCOUNT_TOKEN: &str = "Account/v1/GenerateToken";
const ACCOUNT_AUTHORIZED: &str = "Account/v1/Authorized";
const BOOKSTORE_BOOKS: &str = "BookStore/v1/Books";

pub struct BookStoreClient {
    http: Client,
    base: Url,
}

impl BookStoreClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let mut base = Url::parse(base_url)?;
        // Trailing slash so join() appends instead of replacing the path.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    /// `POST Account/v1/User` — 201 with the new user's id.
    pub async fn create_user(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<CreatedUser, ApiError> {
        let response = self
            .http
            .post(self.endpoint(ACCOUNT_USER)?)
            .json(&AccountRequest {
                user_name: user_name.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let response = expect_status("create user", StatusCode::CREATED, response).await?;
        let created: CreatedUser = response.json().await?;
        debug!(target: "bookstore-client", user_id = %created.user_id, "account created");
        Ok(created)
    }

    /// `POST Account/v1/GenerateToken` — 200 with token and status fields.
    pub async fn generate_token(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<TokenResponse, ApiError> {
        let response = self
            .http
            .post(self.endpoint(ACCOUNT_TOKEN)?)
            .json(&AccountRequest {
                user_name: user_name.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let response = expect_status("generate token", StatusCode::OK, response).await?;
        Ok(response.json().await?)
    }

    /// `POST Account/v1/Authorized` — 200 with a bare boolean body.
    pub async fn authorized(&self, user_name: &str, password: &str) -> Result<bool, ApiError> {
        let response = self
            .http
            .post(self.endpoint(ACCOUNT_AUTHORIZED)?)
            .json(&AccountRequest {
                user_name: user_name.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let response = expect_status("authorize", StatusCode::OK, response).await?;
        let body = response.text().await?;
        Ok(body.trim() == "true")
    }

    /// `GET BookStore/v1/Books` — 200 with the catalog.
    pub async fn books(&self) -> Result<BookList, ApiError> {
        let response = self.http.get(self.endpoint(BOOKSTORE_BOOKS)?).send().await?;
        let response = expect_status("list books", StatusCode::OK, response).await?;
        Ok(response.json().await?)
    }

    /// `POST BookStore/v1/Books` with a bearer token — 201 on reservation.
    pub async fn reserve_books(
        &self,
        token: &str,
        user_id: &str,
        isbns: &[String],
    ) -> Result<(), ApiError> {
        let request = ReservationRequest {
            user_id: user_id.to_string(),
            collection_of_isbns: isbns
                .iter()
                .map(|isbn| IsbnEntry { isbn: isbn.clone() })
                .collect(),
        };
        let response = self
            .http
            .post(self.endpoint(BOOKSTORE_BOOKS)?)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        expect_status("reserve books", StatusCode::CREATED, response).await?;
        Ok(())
    }

    /// `GET Account/v1/User/{userId}` with a bearer token — 200 with the
    /// profile including reserved books.
    pub async fn profile(&self, token: &str, user_id: &str) -> Result<Profile, ApiError> {
        let path = format!("{ACCOUNT_USER}/{user_id}");
        let response = self
            .http
            .get(self.endpoint(&path)?)
            .bearer_auth(token)
            .send()
            .await?;
        let response = expect_status("fetch profile", StatusCode::OK, response).await?;
        Ok(response.json().await?)
    }
}

async fn expect_status(
    step: &'static str,
    expected: StatusCode,
    response: Response,
) -> Result<Response, ApiError> {
    let actual = response.status();
    if actual == expected {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(ApiError::UnexpectedStatus {
        step,
        expected: expected.as_u16(),
        actual: actual.as_u16(),
        body: snippet,
    })
}
