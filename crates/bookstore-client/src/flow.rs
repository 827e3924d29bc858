//! The reservation flow: sequential dependent calls where each step's
//! output is required input to the next. No step is retried independently;
//! the first failure fails the whole flow.

use chrono::Utc;
use tracing::info;

use crate::client::BookStoreClient;
use crate::error::ApiError;
use crate::models::Book;

const PASSWORD: &str = "Password123!";
const BOOKS_TO_RESERVE: usize = 2;

/// Generated username/password pair, unique per run.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub user_name: String,
    pub password: String,
}

impl Credentials {
    /// Derive a unique username from the current time.
    pub fn generate() -> Self {
        Self {
            user_name: format!("user_internal_{}", Utc::now().timestamp_millis()),
            password: PASSWORD.to_string(),
        }
    }
}

/// State established by the account steps and required by the reservation
/// steps. Explicit context instead of globals so concurrent scenarios
/// cannot leak into each other.
#[derive(Clone, Debug)]
pub struct FlowContext {
    pub user_id: String,
    pub token: String,
    pub picked: Vec<Book>,
}

/// What the completed flow established, for scenario-level assertions.
#[derive(Clone, Debug)]
pub struct ReservationOutcome {
    pub user_id: String,
    pub reserved_titles: Vec<String>,
}

/// Run the full account-to-profile flow against the client.
pub async fn run_reservation_flow(
    client: &BookStoreClient,
    credentials: &Credentials,
) -> Result<ReservationOutcome, ApiError> {
    let user_id = create_account(client, credentials).await?;
    let token = obtain_token(client, credentials).await?;
    authorize(client, credentials).await?;
    let picked = pick_books(client).await?;

    let ctx = FlowContext {
        user_id,
        token,
        picked,
    };
    reserve(client, &ctx).await?;
    verify_profile(client, &ctx).await
}

async fn create_account(
    client: &BookStoreClient,
    credentials: &Credentials,
) -> Result<String, ApiError> {
    let created = client
        .create_user(&credentials.user_name, &credentials.password)
        .await?;
    if created.user_id.is_empty() {
        return Err(ApiError::mismatch("create user", "empty userID"));
    }
    if created.username != credentials.user_name {
        return Err(ApiError::mismatch(
            "create user",
            format!(
                "username echo mismatch: sent {}, got {}",
                credentials.user_name, created.username
            ),
        ));
    }
    Ok(created.user_id)
}

async fn obtain_token(
    client: &BookStoreClient,
    credentials: &Credentials,
) -> Result<String, ApiError> {
    let response = client
        .generate_token(&credentials.user_name, &credentials.password)
        .await?;
    if response.status.as_deref() != Some("Success") {
        return Err(ApiError::mismatch(
            "generate token",
            format!("status {:?}", response.status),
        ));
    }
    response
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::mismatch("generate token", "empty token"))
}

async fn authorize(
    client: &BookStoreClient,
    credentials: &Credentials,
) -> Result<(), ApiError> {
    let authorized = client
        .authorized(&credentials.user_name, &credentials.password)
        .await?;
    if !authorized {
        return Err(ApiError::mismatch("authorize", "response was not 'true'"));
    }
    Ok(())
}

async fn pick_books(client: &BookStoreClient) -> Result<Vec<Book>, ApiError> {
    let catalog = client.books().await?;
    if catalog.books.len() < BOOKS_TO_RESERVE {
        return Err(ApiError::mismatch(
            "list books",
            format!("catalog has only {} books", catalog.books.len()),
        ));
    }
    Ok(catalog.books[..BOOKS_TO_RESERVE].to_vec())
}

async fn reserve(client: &BookStoreClient, ctx: &FlowContext) -> Result<(), ApiError> {
    let isbns: Vec<String> = ctx.picked.iter().map(|book| book.isbn.clone()).collect();
    info!(
        target: "bookstore-client",
        titles = ?ctx.picked.iter().map(|book| &book.title).collect::<Vec<_>>(),
        "reserving books"
    );
    client.reserve_books(&ctx.token, &ctx.user_id, &isbns).await
}

/// Cross-check the profile against the titles obtained from the listing.
async fn verify_profile(
    client: &BookStoreClient,
    ctx: &FlowContext,
) -> Result<ReservationOutcome, ApiError> {
    let profile = client.profile(&ctx.token, &ctx.user_id).await?;
    if profile.books.len() != BOOKS_TO_RESERVE {
        return Err(ApiError::mismatch(
            "fetch profile",
            format!(
                "expected {} reserved books, profile has {}",
                BOOKS_TO_RESERVE,
                profile.books.len()
            ),
        ));
    }
    for picked in &ctx.picked {
        if !profile.books.iter().any(|book| book.title == picked.title) {
            return Err(ApiError::mismatch(
                "fetch profile",
                format!("title '{}' missing from profile", picked.title),
            ));
        }
    }

    Ok(ReservationOutcome {
        user_id: ctx.user_id.clone(),
        reserved_titles: profile.books.into_iter().map(|book| book.title).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_credentials_use_the_fixed_password() {
        let credentials = Credentials::generate();
        assert!(credentials.user_name.starts_with("user_internal_"));
        assert_eq!(credentials.password, PASSWORD);
    }
}
