//! Record store for Mentor.
//!
//! Owns the collection of user accounts and the device-level moderation
//! counters, persisted through a [`KeyValueStore`] under versioned keys.
//! A schema change is handled by bumping the key suffix, never by
//! migrating a value in place.

use std::collections::HashSet;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::core::model::{
    DeviceState, Message, ProgressUpdate, Roadmap, TeacherPersona, User, UserPreferences,
    UserProgress,
};
use crate::error::{MentorError, Result};
use crate::storage::KeyValueStore;

/// Key holding the JSON array of users, in insertion order.
pub const USERS_KEY: &str = "MENTOR_USERS_DB_V1";
/// Key holding `"true"` once the device is banned.
pub const DEVICE_BANNED_KEY: &str = "MENTOR_DEVICE_BANNED_V1";
/// Key holding the device warning count as a decimal integer.
pub const DEVICE_WARNINGS_KEY: &str = "MENTOR_DEVICE_WARNINGS_V1";

/// Random draws attempted before falling back to a scan of free codes.
const RANDOM_ID_ATTEMPTS: u32 = 32;

/// Allocate a fresh account code in `1..=space`.
///
/// Codes are decimal, zero-padded to at least three digits. A bounded
/// number of random draws is tried first; when they all collide, a code is
/// picked uniformly among the ones still free, so allocation always
/// terminates.
pub fn allocate_id<R: Rng>(taken: &HashSet<&str>, space: u32, rng: &mut R) -> Result<String> {
    let space = space.max(1);

    for _ in 0..RANDOM_ID_ATTEMPTS {
        let candidate = format_id(rng.gen_range(1..=space));
        if !taken.contains(candidate.as_str()) {
            return Ok(candidate);
        }
    }

    // Taken may hold ids outside the space, so only a scan can tell
    // whether the space is full.
    let available: Vec<u32> = (1..=space)
        .filter(|n| !taken.contains(format_id(*n).as_str()))
        .collect();
    if available.is_empty() {
        return Err(MentorError::IdSpaceExhausted { capacity: space });
    }
    let pick = available[rng.gen_range(0..available.len())];
    Ok(format_id(pick))
}

fn format_id(n: u32) -> String {
    format!("{:03}", n)
}

/// Durable store of user accounts and device moderation state.
///
/// Users are cached in memory and written through on every mutation; the
/// cache only changes after the write succeeds.
pub struct RecordStore<S: KeyValueStore> {
    store: S,
    users: Vec<User>,
    id_space: u32,
    rng: StdRng,
}

impl<S: KeyValueStore> RecordStore<S> {
    /// Open a record store, loading existing users.
    ///
    /// A corrupt users collection is an error rather than an empty list, so
    /// that a later write cannot silently overwrite it.
    pub fn open(store: S, id_space: u32) -> Result<Self> {
        let users = match store.get(USERS_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| MentorError::serde(format!("{}: {}", USERS_KEY, e)))?,
            None => Vec::new(),
        };

        Ok(Self {
            store,
            users,
            id_space,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a seeded generator for reproducible ids.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Underlying key-value store.
    pub fn backend(&self) -> &S {
        &self.store
    }

    fn persist(&self, users: &[User]) -> Result<()> {
        let json = serde_json::to_string(users)?;
        self.store.set(USERS_KEY, &json)
    }

    fn position(&self, user_id: &str) -> Option<usize> {
        self.users.iter().position(|u| u.id == user_id)
    }

    /// Replace one user in a copy of the collection, persist, then commit.
    fn commit_user(&mut self, index: usize, user: User) -> Result<User> {
        let mut next = self.users.clone();
        next[index] = user.clone();
        self.persist(&next)?;
        self.users = next;
        Ok(user)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create and persist a new account.
    ///
    /// A blank name becomes `Student <id>`.
    pub fn create_user(
        &mut self,
        name: &str,
        preferences: UserPreferences,
        persona: TeacherPersona,
        roadmap: Roadmap,
    ) -> Result<User> {
        let id = {
            let taken: HashSet<&str> = self.users.iter().map(|u| u.id.as_str()).collect();
            allocate_id(&taken, self.id_space, &mut self.rng)?
        };

        let name = name.trim();
        let name = if name.is_empty() {
            format!("Student {}", id)
        } else {
            name.to_string()
        };

        let user = User {
            id,
            name,
            preferences,
            persona,
            roadmap,
            progress: UserProgress::starting(Utc::now()),
            chat_history: Vec::new(),
            warning_count: 0,
            is_banned: false,
        };

        let mut next = self.users.clone();
        next.push(user.clone());
        self.persist(&next)?;
        self.users = next;

        info!("User created: {} (ID: {})", user.name, user.id);
        Ok(user)
    }

    /// Look up an account by exact id.
    pub fn get_user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    /// Look up an account by name (case and whitespace insensitive) and exact id.
    pub fn find_user_by_name_and_id(&self, name: &str, user_id: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.id == user_id && u.name_matches(name))
    }

    /// All accounts in creation order.
    pub fn list_users(&self) -> &[User] {
        &self.users
    }

    /// The `limit` most recently created accounts, newest first.
    pub fn recent_users(&self, limit: usize) -> Vec<&User> {
        self.users.iter().rev().take(limit).collect()
    }

    /// Merge a progress update and optionally replace the chat history.
    ///
    /// `last_session_date` is always refreshed. Returns `Ok(None)` if no
    /// account has this id. Banned accounts are read-only.
    pub fn update_user_progress(
        &mut self,
        user_id: &str,
        update: &ProgressUpdate,
        chat_history: Option<Vec<Message>>,
    ) -> Result<Option<User>> {
        let Some(index) = self.position(user_id) else {
            warn!("Progress update for unknown user {}", user_id);
            return Ok(None);
        };

        let mut user = self.users[index].clone();
        if user.is_banned {
            return Err(MentorError::account_suspended(user_id));
        }

        user.progress.merge(update, Utc::now());
        if let Some(history) = chat_history {
            user.chat_history = history;
        }

        self.commit_user(index, user).map(Some)
    }

    /// Overwrite the moderation fields of an account.
    ///
    /// Bans never revert and the warning count never decreases; a request
    /// that would do either keeps the stored value. Returns `Ok(None)` if no
    /// account has this id.
    pub fn update_user_safety(
        &mut self,
        user_id: &str,
        is_banned: bool,
        warning_count: u32,
    ) -> Result<Option<User>> {
        let Some(index) = self.position(user_id) else {
            warn!("Safety update for unknown user {}", user_id);
            return Ok(None);
        };

        let mut user = self.users[index].clone();
        if user.is_banned && !is_banned {
            warn!("Ignoring unban request for user {}", user_id);
        }
        if warning_count < user.warning_count {
            warn!(
                "Ignoring warning count decrease for user {} ({} -> {})",
                user_id, user.warning_count, warning_count
            );
        }
        user.is_banned = user.is_banned || is_banned;
        user.warning_count = user.warning_count.max(warning_count);

        if user.is_banned {
            info!("User {} is banned ({} warnings)", user.id, user.warning_count);
        }

        self.commit_user(index, user).map(Some)
    }

    // =========================================================================
    // Device
    // =========================================================================

    /// Whether this device is banned.
    pub fn is_device_banned(&self) -> Result<bool> {
        Ok(self.store.get(DEVICE_BANNED_KEY)?.as_deref() == Some("true"))
    }

    /// Ban this device. Idempotent.
    pub fn ban_device(&self) -> Result<()> {
        info!("Device banned");
        self.store.set(DEVICE_BANNED_KEY, "true")
    }

    /// Device-scope warnings recorded so far.
    ///
    /// An unreadable value counts as zero.
    pub fn get_device_warnings(&self) -> Result<u32> {
        Ok(self
            .store
            .get(DEVICE_WARNINGS_KEY)?
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Record one more device warning and return the new count.
    pub fn increment_device_warnings(&self) -> Result<u32> {
        let next = self.get_device_warnings()?.saturating_add(1);
        self.store.set(DEVICE_WARNINGS_KEY, &next.to_string())?;
        Ok(next)
    }

    /// Snapshot of the device moderation state.
    pub fn device_state(&self) -> Result<DeviceState> {
        Ok(DeviceState {
            banned: self.is_device_banned()?,
            warnings: self.get_device_warnings()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::WeeklyGoal;
    use crate::storage::{FileStore, MemoryStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn prefs() -> UserPreferences {
        UserPreferences {
            native_language: "English".to_string(),
            target_language: "German".to_string(),
            level: "Beginner (A1)".to_string(),
            goals: "Travel".to_string(),
            interests: "Travel, Tech".to_string(),
            learning_style: String::new(),
        }
    }

    fn persona() -> TeacherPersona {
        TeacherPersona {
            name: "Lena".to_string(),
            age: 34,
            personality: "Warm".to_string(),
            teaching_style: "Conversational".to_string(),
            catchphrase: "Los geht's!".to_string(),
            avatar_seed: 7,
        }
    }

    fn roadmap() -> Roadmap {
        Roadmap {
            weeks: (1..=4)
                .map(|week| WeeklyGoal {
                    week,
                    theme: format!("Theme {}", week),
                    focus: "Greetings".to_string(),
                    activity: "Role play".to_string(),
                    completed: false,
                })
                .collect(),
        }
    }

    fn memory_records() -> (RecordStore<Arc<MemoryStore>>, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        let records = RecordStore::open(Arc::clone(&backend), 100_000)
            .unwrap()
            .with_seed(7);
        (records, backend)
    }

    fn create(records: &mut RecordStore<Arc<MemoryStore>>, name: &str) -> User {
        records
            .create_user(name, prefs(), persona(), roadmap())
            .unwrap()
    }

    #[test]
    fn test_create_user_defaults() {
        let (mut records, _) = memory_records();
        let user = create(&mut records, "Alex");

        assert_eq!(user.name, "Alex");
        assert!(user.id.len() >= 3);
        assert!(user.id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(user.warning_count, 0);
        assert!(!user.is_banned);
        assert!(user.chat_history.is_empty());
        assert_eq!(user.progress.xp, 0);
        assert_eq!(user.progress.streak, 1);
        assert_eq!(user.progress.last_topic, "Introduction");
    }

    #[test]
    fn test_blank_name_gets_student_label() {
        let (mut records, _) = memory_records();
        let user = create(&mut records, "   ");
        assert_eq!(user.name, format!("Student {}", user.id));
    }

    #[test]
    fn test_create_user_persists() {
        let (mut records, backend) = memory_records();
        let user = create(&mut records, "Alex");

        let reopened = RecordStore::open(Arc::clone(&backend), 100_000).unwrap();
        assert_eq!(reopened.list_users(), &[user]);
    }

    #[test]
    fn test_create_user_surfaces_storage_failure() {
        let (mut records, backend) = memory_records();
        backend.set_fail_writes(true);

        let result = records.create_user("Alex", prefs(), persona(), roadmap());

        assert!(matches!(result, Err(MentorError::Storage { .. })));
        assert!(records.list_users().is_empty());
    }

    #[test]
    fn test_find_user_by_name_and_id() {
        let backend = Arc::new(MemoryStore::new());
        let mut alex = {
            let mut records = RecordStore::open(Arc::clone(&backend), 100_000).unwrap();
            create(&mut records, "Alex")
        };
        alex.id = "042".to_string();
        backend
            .set(USERS_KEY, &serde_json::to_string(&vec![alex.clone()]).unwrap())
            .unwrap();

        let records = RecordStore::open(Arc::clone(&backend), 100_000).unwrap();

        assert_eq!(records.find_user_by_name_and_id("  alex ", "042"), Some(&alex));
        assert!(records.find_user_by_name_and_id("alex", "42").is_none());
        assert!(records.find_user_by_name_and_id("sam", "042").is_none());
    }

    #[test]
    fn test_list_and_recent_order() {
        let (mut records, _) = memory_records();
        let a = create(&mut records, "A");
        let b = create(&mut records, "B");
        let c = create(&mut records, "C");
        let d = create(&mut records, "D");

        let ids: Vec<&str> = records.list_users().iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str(), d.id.as_str()]);

        let recent: Vec<&str> = records.recent_users(3).iter().map(|u| u.name.as_str()).collect();
        assert_eq!(recent, vec!["D", "C", "B"]);
    }

    #[test]
    fn test_update_user_progress_merges() {
        let (mut records, _) = memory_records();
        let user = create(&mut records, "Alex");
        let before = user.progress.last_session_date;

        let history = vec![Message::user("Hallo"), Message::model("Hallo Alex!")];
        let update = ProgressUpdate {
            xp: Some(10),
            ..Default::default()
        };
        let updated = records
            .update_user_progress(&user.id, &update, Some(history.clone()))
            .unwrap()
            .unwrap();

        assert_eq!(updated.progress.xp, 10);
        assert_eq!(updated.progress.streak, 1);
        assert_eq!(updated.progress.last_topic, "Introduction");
        assert!(updated.progress.last_session_date >= before);
        assert_eq!(updated.chat_history, history);
        assert_eq!(records.get_user(&user.id), Some(&updated));
    }

    #[test]
    fn test_update_without_history_keeps_history() {
        let (mut records, _) = memory_records();
        let user = create(&mut records, "Alex");
        let history = vec![Message::user("Hallo")];
        records
            .update_user_progress(&user.id, &ProgressUpdate::default(), Some(history.clone()))
            .unwrap();

        let updated = records
            .update_user_progress(&user.id, &ProgressUpdate::topic("Food"), None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.chat_history, history);
        assert_eq!(updated.progress.last_topic, "Food");
    }

    #[test]
    fn test_update_unknown_user_is_not_found() {
        let (mut records, _) = memory_records();
        assert!(records
            .update_user_progress("999", &ProgressUpdate::default(), None)
            .unwrap()
            .is_none());
        assert!(records.update_user_safety("999", true, 2).unwrap().is_none());
    }

    #[test]
    fn test_update_user_safety() {
        let (mut records, _) = memory_records();
        let user = create(&mut records, "Alex");

        let warned = records.update_user_safety(&user.id, false, 1).unwrap().unwrap();
        assert_eq!(warned.warning_count, 1);
        assert!(!warned.is_banned);

        let banned = records.update_user_safety(&user.id, true, 2).unwrap().unwrap();
        assert!(banned.is_banned);
        assert_eq!(banned.warning_count, 2);
    }

    #[test]
    fn test_ban_never_reverts() {
        let (mut records, _) = memory_records();
        let user = create(&mut records, "Alex");
        records.update_user_safety(&user.id, true, 2).unwrap();

        let after = records.update_user_safety(&user.id, false, 0).unwrap().unwrap();
        assert!(after.is_banned);
        assert_eq!(after.warning_count, 2);
    }

    #[test]
    fn test_banned_user_progress_is_read_only() {
        let (mut records, _) = memory_records();
        let user = create(&mut records, "Alex");
        records.update_user_safety(&user.id, true, 2).unwrap();

        let result = records.update_user_progress(
            &user.id,
            &ProgressUpdate::topic("anything"),
            Some(vec![Message::user("hi")]),
        );
        assert!(matches!(result, Err(MentorError::AccountSuspended { .. })));
        assert!(records.get_user(&user.id).unwrap().chat_history.is_empty());
    }

    #[test]
    fn test_device_state_defaults() {
        let (records, _) = memory_records();
        assert!(!records.is_device_banned().unwrap());
        assert_eq!(records.get_device_warnings().unwrap(), 0);
        assert_eq!(records.device_state().unwrap(), DeviceState::default());
    }

    #[test]
    fn test_increment_device_warnings() {
        let (records, _) = memory_records();
        assert_eq!(records.increment_device_warnings().unwrap(), 1);
        assert_eq!(records.increment_device_warnings().unwrap(), 2);
        assert_eq!(records.get_device_warnings().unwrap(), 2);
    }

    #[test]
    fn test_ban_device_is_idempotent() {
        let (records, _) = memory_records();
        records.ban_device().unwrap();
        records.ban_device().unwrap();
        assert!(records.is_device_banned().unwrap());
    }

    #[test]
    fn test_corrupt_device_warnings_read_as_zero() {
        let (records, backend) = memory_records();
        backend.set(DEVICE_WARNINGS_KEY, "lots").unwrap();
        assert_eq!(records.get_device_warnings().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_users_collection_is_an_error() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(USERS_KEY, "{not json").unwrap();
        let result = RecordStore::open(backend, 100_000);
        assert!(matches!(result, Err(MentorError::Serde { .. })));
    }

    #[test]
    fn test_file_backed_round_trip() {
        let dir = TempDir::new().unwrap();
        let user = {
            let store = FileStore::with_dir(dir.path()).unwrap();
            let mut records = RecordStore::open(store, 100_000).unwrap();
            records.ban_device().unwrap();
            records
                .create_user("Alex", prefs(), persona(), roadmap())
                .unwrap()
        };

        let store = FileStore::with_dir(dir.path()).unwrap();
        let records = RecordStore::open(store, 100_000).unwrap();
        assert_eq!(records.get_user(&user.id), Some(&user));
        assert!(records.is_device_banned().unwrap());
    }

    #[test]
    fn test_allocate_id_pads_to_three_digits() {
        let mut rng = StdRng::seed_from_u64(1);
        let taken = HashSet::new();
        let id = allocate_id(&taken, 9, &mut rng).unwrap();
        assert_eq!(id.len(), 3);
        assert!(id.starts_with("00"));
    }

    #[test]
    fn test_allocate_id_fills_small_space_without_repeats() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut issued: Vec<String> = Vec::new();

        for _ in 0..50 {
            let taken: HashSet<&str> = issued.iter().map(String::as_str).collect();
            let id = allocate_id(&taken, 50, &mut rng).unwrap();
            assert!(!issued.contains(&id));
            issued.push(id);
        }

        let taken: HashSet<&str> = issued.iter().map(String::as_str).collect();
        assert!(matches!(
            allocate_id(&taken, 50, &mut rng),
            Err(MentorError::IdSpaceExhausted { capacity: 50 })
        ));
    }

    #[test]
    fn test_allocate_id_ignores_codes_outside_space() {
        let mut rng = StdRng::seed_from_u64(5);
        let taken: HashSet<&str> = ["5000", "7000"].into_iter().collect();

        let id = allocate_id(&taken, 2, &mut rng).unwrap();
        assert!(id == "001" || id == "002");
    }

    #[test]
    fn test_shrunk_space_still_allocates_free_codes() {
        let backend = Arc::new(MemoryStore::new());
        {
            let mut records = RecordStore::open(Arc::clone(&backend), 100_000)
                .unwrap()
                .with_seed(4);
            create(&mut records, "A");
            create(&mut records, "B");
        }

        let mut records = RecordStore::open(backend, 3).unwrap().with_seed(4);
        let user = create(&mut records, "C");
        assert!(["001", "002", "003"].contains(&user.id.as_str()));
        assert_eq!(records.list_users().len(), 3);
    }

    #[test]
    fn test_create_user_reports_exhausted_space() {
        let backend = Arc::new(MemoryStore::new());
        let mut records = RecordStore::open(backend, 2).unwrap().with_seed(11);
        create(&mut records, "A");
        create(&mut records, "B");

        let result = records.create_user("C", prefs(), persona(), roadmap());
        assert!(matches!(result, Err(MentorError::IdSpaceExhausted { .. })));
        assert_eq!(records.list_users().len(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Property: every created id is a 3+ digit numeric string unique in the store
            #[test]
            fn prop_created_ids_unique(
                names in proptest::collection::vec("[A-Za-z ]{0,12}", 1..40),
                seed in any::<u64>(),
            ) {
                let backend = Arc::new(MemoryStore::new());
                let mut records = RecordStore::open(backend, 100_000).unwrap().with_seed(seed);
                let mut seen = HashSet::new();

                for name in &names {
                    let user = records.create_user(name, prefs(), persona(), roadmap()).unwrap();
                    prop_assert!(user.id.len() >= 3);
                    prop_assert!(user.id.chars().all(|c| c.is_ascii_digit()));
                    prop_assert!(seen.insert(user.id.clone()));
                }
            }

            // Property: ids stay unique even when the space is nearly full
            #[test]
            fn prop_ids_unique_in_tight_space(space in 1u32..30, seed in any::<u64>()) {
                let backend = Arc::new(MemoryStore::new());
                let mut records = RecordStore::open(backend, space).unwrap().with_seed(seed);

                for _ in 0..space {
                    records.create_user("x", prefs(), persona(), roadmap()).unwrap();
                }
                let ids: HashSet<&str> = records.list_users().iter().map(|u| u.id.as_str()).collect();
                prop_assert_eq!(ids.len(), space as usize);
            }

            // Property: a progress update changes exactly the fields it names
            #[test]
            fn prop_progress_update_round_trip(
                topic in proptest::option::of("[a-z ]{1,20}"),
                xp in proptest::option::of(0u32..10_000),
                streak in proptest::option::of(1u32..400),
            ) {
                let (mut records, _) = memory_records();
                let user = create(&mut records, "Alex");
                let update = ProgressUpdate { last_topic: topic.clone(), xp, streak };

                records.update_user_progress(&user.id, &update, None).unwrap();
                let fetched = records.get_user(&user.id).unwrap();

                prop_assert_eq!(&fetched.progress.last_topic, topic.as_ref().unwrap_or(&user.progress.last_topic));
                prop_assert_eq!(fetched.progress.xp, xp.unwrap_or(user.progress.xp));
                prop_assert_eq!(fetched.progress.streak, streak.unwrap_or(user.progress.streak));
                prop_assert!(fetched.progress.last_session_date >= user.progress.last_session_date);
            }
        }
    }
}
