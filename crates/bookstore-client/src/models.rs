//! Request and response shapes of the Book Store endpoints. Unknown fields
//! are ignored; the flow asserts only on what its contract names.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatedUser {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Book {
    pub isbn: String,
    pub title: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BookList {
    pub books: Vec<Book>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub user_id: String,
    pub collection_of_isbns: Vec<IsbnEntry>,
}

#[derive(Clone, Debug, Serialize)]
pub struct IsbnEntry {
    pub isbn: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    pub books: Vec<Book>,
}
