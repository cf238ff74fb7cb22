use crate::db::schema::users;
use crate::db::Conn;
use crate::profile::Profile;
use crate::types::ApiError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use diesel::prelude::*;
use std::borrow::Cow;

#[derive(Debug, Queryable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub hash: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    pub fn new_password(&mut self, password: &str) -> Result<(), ApiError> {
        self.hash = User::make_password(password)?;
        Ok(())
    }

    /// A stored hash that fails to parse never verifies.
    pub fn verify_password(&self, password_to_verify: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password_to_verify.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn load(user_id: i32, connection: &mut Conn) -> Result<User, ApiError> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_name(name: &str, connection: &mut Conn) -> Result<User, ApiError> {
        users::table
            .filter(users::username.eq(name))
            .select(User::as_select())
            .get_result::<User>(connection)
            .optional()?
            .ok_or(ApiError::NotFound("profile"))
    }

    pub fn load_by_email(email: &str, connection: &mut Conn) -> Result<Option<User>, ApiError> {
        let user = users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .get_result::<User>(connection)
            .optional()?;
        Ok(user)
    }

    pub fn profile(&self, following: bool) -> Profile<'_> {
        Profile {
            username: Cow::Borrowed(&self.username),
            bio: self.bio.as_deref().map(Cow::Borrowed),
            image: self.image.as_deref().map(Cow::Borrowed),
            following,
        }
    }

    pub fn into_profile(self, following: bool) -> Profile<'static> {
        Profile {
            username: Cow::Owned(self.username),
            bio: self.bio.map(Cow::Owned),
            image: self.image.map(Cow::Owned),
            following,
        }
    }

    /// The authenticated representation returned by the `/users` and
    /// `/user` endpoints.
    pub fn view(&self, token: String) -> UserView<'_> {
        UserView {
            email: &self.email,
            token,
            username: &self.username,
            bio: self.bio.as_deref(),
            image: self.image.as_deref(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub hash: String,
}

#[derive(Debug, Serialize)]
pub struct UserView<'a> {
    pub email: &'a str,
    pub token: String,
    pub username: &'a str,
    pub bio: Option<&'a str>,
    pub image: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_password(password: &str) -> User {
        User {
            id: 1,
            username: "jake".into(),
            email: "jake@jake.jake".into(),
            hash: User::make_password(password).unwrap(),
            bio: None,
            image: None,
        }
    }

    #[test]
    fn hashed_password_verifies() {
        let user = user_with_password("jakejakejake");
        assert_ne!(user.hash, "jakejakejake");
        assert!(user.verify_password("jakejakejake"));
        assert!(!user.verify_password("jakejakejak"));
    }

    #[test]
    fn new_password_replaces_the_old_one() {
        let mut user = user_with_password("first-password");
        user.new_password("second-password").unwrap();
        assert!(user.verify_password("second-password"));
        assert!(!user.verify_password("first-password"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        let mut user = user_with_password("whatever1");
        user.hash = "not a phc string".into();
        assert!(!user.verify_password("whatever1"));
    }

    #[test]
    fn profile_borrows_from_the_user() {
        let mut user = user_with_password("whatever1");
        user.bio = Some("I work at statefarm".into());
        let profile = user.profile(true);
        assert_eq!(profile.username, "jake");
        assert_eq!(profile.bio.as_deref(), Some("I work at statefarm"));
        assert!(profile.image.is_none());
        assert!(profile.following);
    }
}
