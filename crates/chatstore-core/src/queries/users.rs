use chrono::Utc;

use crate::error::DbError;
use crate::models::{collections, NewUser, User, CREATED_AT};
use crate::store::{FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    /// Users with the given email, most recent first.
    pub async fn get_user(&self, email: &str) -> Result<Vec<User>, DbError> {
        let query = FindQuery::new(Where::new().eq("email", email)).sort(Sort::desc(CREATED_AT));
        self.find_all(collections::USERS, &query)
            .await
            .map_err(bad_request("Failed to get user by email"))
    }

    /// Creates a user, storing only a hash of `password`.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<User, DbError> {
        let hash = password_auth::generate_hash(password);
        self.create_one(
            collections::USERS,
            &NewUser {
                email,
                password: &hash,
            },
        )
        .await
        .map_err(bad_request("Failed to create user"))
    }

    /// Creates a throwaway user with a random password.
    pub async fn create_guest_user(&self) -> Result<User, DbError> {
        let email = format!("guest-{}@guest.local", Utc::now().timestamp_millis());
        let hash = password_auth::generate_hash(uuid::Uuid::new_v4().to_string());
        self.create_one(
            collections::USERS,
            &NewUser {
                email: &email,
                password: &hash,
            },
        )
        .await
        .map_err(bad_request("Failed to create guest user"))
    }
}
