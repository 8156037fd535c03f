//! The account and game catalog: one writer lock guarding two namespaces of
//! accounts (players, developers) and the game listing, mirrored to disk on
//! every mutation.

pub mod accounts;
pub mod games;
pub mod persistence;
pub mod version;

pub use accounts::{Account, Role};
pub use games::{Game, Review};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Username or password is empty")]
    EmptyCredentials,
    #[error("Username already exists")]
    UsernameExists,
    #[error("Unknown username")]
    UnknownUser,
    #[error("Incorrect password")]
    BadPassword,
    #[error("Account already logged in from another session")]
    AlreadyOnline,
    #[error("game not found")]
    GameNotFound,
    #[error("only the original author may modify this game")]
    NotAuthor,
    #[error("new version must be strictly newer than the current version")]
    VersionNotNewer,
    #[error("rating must be between 1 and 5")]
    InvalidRating,
}

/// Allocates the next id in a `"1"`, `"2"`, ... sequence: one greater than the
/// largest numeric id currently present, or `"1"` if the set is empty or none
/// of the existing keys parse as a number.
fn next_numeric_id<'a>(existing: impl Iterator<Item = &'a String>) -> String {
    let max = existing.filter_map(|id| id.parse::<u64>().ok()).max();
    (max.unwrap_or(0) + 1).to_string()
}

struct CatalogInner {
    players: HashMap<String, Account>,
    developers: HashMap<String, Account>,
    games: HashMap<String, Game>,
}

/// The single writer-locked source of truth for accounts and games.
///
/// The original prototype split this responsibility across a lobby server, a
/// developer server and a separate database server talking over their own
/// socket. Those three processes never actually disagreed about state — they
/// were the same data behind an extra hop — so here they collapse into one
/// `Catalog` behind one `RwLock`.
pub struct Catalog {
    inner: RwLock<CatalogInner>,
    data_dir: PathBuf,
}

impl Catalog {
    pub async fn new(data_dir: PathBuf) -> Arc<Self> {
        let players = persistence::load_players(&data_dir).await;
        let developers = persistence::load_developers(&data_dir).await;
        let games = persistence::load_games(&data_dir).await;
        Arc::new(Self {
            inner: RwLock::new(CatalogInner {
                players,
                developers,
                games,
            }),
            data_dir,
        })
    }

    fn table(inner: &CatalogInner, role: Role) -> &HashMap<String, Account> {
        match role {
            Role::Player => &inner.players,
            Role::Developer => &inner.developers,
        }
    }

    fn table_mut(inner: &mut CatalogInner, role: Role) -> &mut HashMap<String, Account> {
        match role {
            Role::Player => &mut inner.players,
            Role::Developer => &mut inner.developers,
        }
    }

    async fn persist_accounts(&self, inner: &CatalogInner, role: Role) {
        match role {
            Role::Player => persistence::save_players(&self.data_dir, &inner.players).await,
            Role::Developer => {
                persistence::save_developers(&self.data_dir, &inner.developers).await
            }
        }
    }

    async fn persist_games(&self, inner: &CatalogInner) {
        persistence::save_games(&self.data_dir, &inner.games).await;
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<(), CatalogError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(CatalogError::EmptyCredentials);
        }
        let mut inner = self.inner.write().await;
        if Self::table(&inner, role).contains_key(username) {
            return Err(CatalogError::UsernameExists);
        }
        Self::table_mut(&mut inner, role).insert(username.to_string(), Account::new(username, password));
        self.persist_accounts(&inner, role).await;
        Ok(())
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<(), CatalogError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(CatalogError::EmptyCredentials);
        }
        let mut inner = self.inner.write().await;
        let account = Self::table_mut(&mut inner, role)
            .get_mut(username)
            .ok_or(CatalogError::UnknownUser)?;
        if account.password != password {
            return Err(CatalogError::BadPassword);
        }
        if account.is_online {
            return Err(CatalogError::AlreadyOnline);
        }
        account.is_online = true;
        account.last_login = Some(chrono::Utc::now());
        self.persist_accounts(&inner, role).await;
        Ok(())
    }

    /// Idempotent: logging out twice, or an account that was never online, both succeed.
    pub async fn logout(&self, username: &str, role: Role) -> Result<(), CatalogError> {
        let mut inner = self.inner.write().await;
        let account = Self::table_mut(&mut inner, role)
            .get_mut(username)
            .ok_or(CatalogError::UnknownUser)?;
        account.is_online = false;
        self.persist_accounts(&inner, role).await;
        Ok(())
    }

    pub async fn list_online_users(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .players
            .values()
            .filter(|a| a.is_online)
            .map(|a| a.username.clone())
            .collect()
    }

    pub async fn list_games(&self) -> Vec<Game> {
        let inner = self.inner.read().await;
        inner.games.values().cloned().collect()
    }

    pub async fn get_game(&self, game_id: &str) -> Result<Game, CatalogError> {
        let inner = self.inner.read().await;
        inner
            .games
            .get(game_id)
            .cloned()
            .ok_or(CatalogError::GameNotFound)
    }

    pub async fn list_developer_games(&self, author: &str) -> Vec<Game> {
        let inner = self.inner.read().await;
        inner
            .games
            .values()
            .filter(|g| g.author == author)
            .cloned()
            .collect()
    }

    pub async fn add_game(
        &self,
        author: &str,
        name: &str,
        description: &str,
        version: &str,
        max_players: u32,
    ) -> String {
        let now = chrono::Utc::now();
        let mut inner = self.inner.write().await;
        let game_id = next_numeric_id(inner.games.keys());
        inner.games.insert(
            game_id.clone(),
            Game {
                game_id: game_id.clone(),
                name: name.to_string(),
                description: description.to_string(),
                version: version.to_string(),
                author: author.to_string(),
                max_players,
                download_count: 0,
                reviews: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        );
        self.persist_games(&inner).await;
        debug!(game_id, author, "registered new game");
        game_id
    }

    /// Removes a game record without an ownership check. Used only to roll back a
    /// half-completed upload when package validation fails after the catalog entry
    /// was already created.
    pub async fn remove_game_unconditionally(&self, game_id: &str) {
        let mut inner = self.inner.write().await;
        inner.games.remove(game_id);
        self.persist_games(&inner).await;
    }

    /// Validates `new_version` is strictly newer than the stored version and that
    /// `requester` is the game's author, without mutating anything. Used at both
    /// transfer INIT (fail fast) and FINISH (re-verify against a possibly-changed
    /// catalog before committing).
    pub async fn verify_update_eligibility(
        &self,
        game_id: &str,
        requester: &str,
        new_version: &str,
    ) -> Result<(), CatalogError> {
        let inner = self.inner.read().await;
        let game = inner.games.get(game_id).ok_or(CatalogError::GameNotFound)?;
        if game.author != requester {
            return Err(CatalogError::NotAuthor);
        }
        if !version::is_strictly_newer(new_version, &game.version) {
            return Err(CatalogError::VersionNotNewer);
        }
        Ok(())
    }

    pub async fn apply_update(
        &self,
        game_id: &str,
        requester: &str,
        new_version: &str,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.write().await;
        {
            let game = inner
                .games
                .get(game_id)
                .ok_or(CatalogError::GameNotFound)?;
            if game.author != requester {
                return Err(CatalogError::NotAuthor);
            }
            if !version::is_strictly_newer(new_version, &game.version) {
                return Err(CatalogError::VersionNotNewer);
            }
        }
        if let Some(game) = inner.games.get_mut(game_id) {
            game.version = new_version.to_string();
            game.updated_at = chrono::Utc::now();
        }
        self.persist_games(&inner).await;
        Ok(())
    }

    pub async fn delete_game(&self, game_id: &str, requester: &str) -> Result<(), CatalogError> {
        let mut inner = self.inner.write().await;
        let game = inner.games.get(game_id).ok_or(CatalogError::GameNotFound)?;
        if game.author != requester {
            return Err(CatalogError::NotAuthor);
        }
        inner.games.remove(game_id);
        self.persist_games(&inner).await;
        Ok(())
    }

    pub async fn add_review(
        &self,
        game_id: &str,
        reviewer: &str,
        score: i64,
        comment: &str,
    ) -> Result<(), CatalogError> {
        if !(1..=5).contains(&score) {
            return Err(CatalogError::InvalidRating);
        }
        let mut inner = self.inner.write().await;
        let game = inner
            .games
            .get_mut(game_id)
            .ok_or(CatalogError::GameNotFound)?;
        game.reviews.push(Review {
            reviewer: reviewer.to_string(),
            score: score as u8,
            comment: comment.to_string(),
        });
        self.persist_games(&inner).await;
        Ok(())
    }

    pub async fn increment_download_count(&self, game_id: &str) -> Result<(), CatalogError> {
        let mut inner = self.inner.write().await;
        let game = inner
            .games
            .get_mut(game_id)
            .ok_or(CatalogError::GameNotFound)?;
        game.download_count += 1;
        self.persist_games(&inner).await;
        Ok(())
    }
}
