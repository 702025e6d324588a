//! Per-mailbox sort preferences
//!
//! All mailbox sort settings of a user live in the single `sortpref`
//! preference, a serialized array of `{mailbox: {"b": sortby, "d": sortdir}}`.
//! Every mutation writes the whole array back immediately.

use crate::hooks::Hooks;
use crate::mailbox::MailboxResolver;
use impmail_common::serial::{self, Array, Key, SerialError, Value};
use impmail_common::types::{SortBy, SortDefaults, SortDirection, SortPatch, SortSpec};
use impmail_common::Result;
use impmail_storage::PrefsBackend;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Preference name in the backend
pub const SORTPREF: &str = "sortpref";

const SORTBY_KEY: &str = "b";
const SORTDIR_KEY: &str = "d";

/// Sort preference store for one user
pub struct SortPrefs {
    backend: Arc<dyn PrefsBackend>,
    hooks: Hooks,
    entries: Array,
}

impl SortPrefs {
    /// Load the stored preference. Malformed data yields an empty store;
    /// backend read errors are returned.
    pub async fn load(backend: Arc<dyn PrefsBackend>, hooks: Hooks) -> Result<Self> {
        let entries = match backend.get_value(SORTPREF).await? {
            Some(raw) => Self::decode(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding malformed sortpref value");
                Array::new()
            }),
            None => Array::new(),
        };

        debug!(entries = entries.len(), "Loaded sort preferences");

        Ok(Self {
            backend,
            hooks,
            entries,
        })
    }

    /// Decode a stored value. The empty string means no preferences.
    pub fn decode(raw: &str) -> std::result::Result<Array, SerialError> {
        if raw.is_empty() {
            return Ok(Array::new());
        }

        let mut entries = Array::new();
        for (key, value) in serial::decode_array(raw)? {
            // Numeric string keys decode to integer keys, later entries win
            let key = Key::from_name(&key.as_str());
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Ok(entries)
    }

    /// Sort specification of `mailbox`, after the `mbox_sort` hook
    pub fn get(&self, mailbox: &str) -> SortSpec {
        let spec = self.stored_spec(mailbox);

        let mut hooked = spec.clone();
        match self.hooks.call_mbox_sort(&mut hooked) {
            Ok(()) => hooked,
            Err(e) if e.is_hook_not_set() => spec,
            Err(e) => {
                warn!(mailbox = %mailbox, error = %e, "mbox_sort hook failed");
                spec
            }
        }
    }

    fn stored_spec(&self, mailbox: &str) -> SortSpec {
        let entry = serial::lookup(&self.entries, mailbox);
        let field = |name: &str| entry.and_then(|e| e.get(name)).and_then(Value::as_int);

        SortSpec {
            mailbox: mailbox.to_string(),
            sort_by: field(SORTBY_KEY).map(SortBy),
            sort_dir: field(SORTDIR_KEY).map(SortDirection::from_raw),
        }
    }

    /// Apply `patch` to the mailbox entry and persist
    pub async fn set(&mut self, mailbox: &str, patch: SortPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut spec = self.get(mailbox);
        if let Some(sort_by) = patch.sort_by {
            spec.sort_by = Some(sort_by);
        }
        if let Some(sort_dir) = patch.sort_dir {
            spec.sort_dir = Some(sort_dir);
        }

        let key = Key::from_name(mailbox);
        let entry = entry_value(&spec);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((key, entry)),
        }

        debug!(
            mailbox = %mailbox,
            sort_by = ?spec.sort_by,
            sort_dir = ?spec.sort_dir,
            "Updated sort preference"
        );

        self.save().await
    }

    /// Remove the mailbox entry. Returns false, without writing, when there
    /// was none.
    pub async fn delete(&mut self, mailbox: &str) -> Result<bool> {
        let key = Key::from_name(mailbox);
        let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) else {
            return Ok(false);
        };

        self.entries.remove(pos);
        self.save().await?;
        Ok(true)
    }

    /// Whether a preference entry exists for `mailbox`
    pub fn contains(&self, mailbox: &str) -> bool {
        serial::lookup(&self.entries, mailbox).is_some()
    }

    /// Stored entries in storage order
    pub fn iter(&self) -> impl Iterator<Item = (Cow<'_, str>, &Value)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the backend locks the preference
    pub fn locked(&self) -> bool {
        self.backend.is_locked(SORTPREF)
    }

    /// The user's fallback criterion and direction
    pub async fn defaults(&self) -> Result<SortDefaults> {
        let fallback = SortDefaults::default();
        let int_pref = |raw: Option<String>| raw.and_then(|v| v.trim().parse::<i64>().ok());

        let sort_by = int_pref(self.backend.get_value("sortby").await?)
            .map(SortBy)
            .unwrap_or(fallback.sort_by);
        let sort_dir = int_pref(self.backend.get_value("sortdir").await?)
            .map(SortDirection::from_raw)
            .unwrap_or(fallback.sort_dir);

        Ok(SortDefaults { sort_by, sort_dir })
    }

    /// Drop entries for mailboxes that no longer exist or that are saved
    /// search queries. Returns the number of entries removed.
    pub async fn gc(&mut self, resolver: &dyn MailboxResolver) -> Result<usize> {
        let names: Vec<String> = self
            .entries
            .iter()
            .map(|(k, _)| k.as_str().into_owned())
            .collect();
        if names.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        for mailbox in resolver.resolve(&names).await? {
            if !mailbox.exists || mailbox.is_query {
                if self.delete(&mailbox.name).await? {
                    removed += 1;
                }
                debug!(
                    mailbox = %mailbox.name,
                    exists = mailbox.exists,
                    is_query = mailbox.is_query,
                    "Purged sort preference"
                );
            }
        }

        if removed > 0 {
            info!(removed, remaining = self.entries.len(), "Sort preference gc complete");
        }

        Ok(removed)
    }

    /// Map a legacy sort code to its replacement. `None` means leave the
    /// stored value alone.
    pub fn migrate_legacy_value(code: i64) -> Option<SortBy> {
        match code {
            // Arrival order was sequence order
            1 => Some(SortBy::SEQUENCE),
            2 => Some(SortBy::DATE),
            161 => Some(SortBy::THREAD),
            _ => None,
        }
    }

    /// Rewrite legacy sort codes in every entry, persisting once. Skipped
    /// while the preference still holds its factory default. Returns whether
    /// the pass ran.
    pub async fn upgrade(&mut self) -> Result<bool> {
        if self.backend.is_default(SORTPREF).await? {
            debug!("sortpref is at its default, nothing to upgrade");
            return Ok(false);
        }

        let mut changed = 0usize;
        for (_, entry) in self.entries.iter_mut() {
            let Some(fields) = entry.as_array_mut() else {
                continue;
            };
            let replacement = serial::lookup(fields, SORTBY_KEY)
                .and_then(Value::as_int)
                .and_then(Self::migrate_legacy_value);
            if let Some(sort_by) = replacement {
                let key = Key::from_name(SORTBY_KEY);
                if let Some(slot) = fields.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = Value::Int(sort_by.code());
                    changed += 1;
                }
            }
        }

        self.save().await?;
        info!(changed, entries = self.entries.len(), "Upgraded sort preferences");

        Ok(true)
    }

    async fn save(&self) -> Result<()> {
        let blob = serial::encode_array(&self.entries);
        if !self.backend.set_value(SORTPREF, &blob).await? {
            debug!("sortpref is locked, change not persisted");
        }
        Ok(())
    }
}

/// Stored form of a spec: only the fields that are set
fn entry_value(spec: &SortSpec) -> Value {
    let mut fields = Array::new();
    if let Some(sort_by) = spec.sort_by {
        fields.push((Key::from_name(SORTBY_KEY), Value::Int(sort_by.code())));
    }
    if let Some(sort_dir) = spec.sort_dir {
        fields.push((Key::from_name(SORTDIR_KEY), Value::Int(sort_dir.to_raw())));
    }
    Value::Array(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxList;
    use impmail_common::Error;
    use crate::prefs::testing::UnreadablePrefs;
    use impmail_storage::MemoryPrefs;
    use pretty_assertions::assert_eq;

    fn memory() -> Arc<MemoryPrefs> {
        Arc::new(MemoryPrefs::default())
    }

    fn preloaded(blob: &str) -> Arc<MemoryPrefs> {
        Arc::new(MemoryPrefs::default().with_value(SORTPREF, blob))
    }

    async fn store(backend: &Arc<MemoryPrefs>) -> SortPrefs {
        SortPrefs::load(backend.clone(), Hooks::none()).await.unwrap()
    }

    #[tokio::test]
    async fn test_set_on_fresh_store() {
        let backend = memory();
        let mut prefs = store(&backend).await;

        prefs.set("INBOX", SortPatch::by(SortBy(2))).await.unwrap();

        let spec = prefs.get("INBOX");
        assert_eq!(spec.sort_by, Some(SortBy(2)));
        assert_eq!(spec.sort_dir, None);

        let blob = backend.stored_value(SORTPREF).await.unwrap();
        assert_eq!(blob, r#"a:1:{s:5:"INBOX";a:1:{s:1:"b";i:2;}}"#);
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_through_backend() {
        let backend = memory();
        let mut prefs = store(&backend).await;

        prefs.set("INBOX", SortPatch::by(SortBy::DATE)).await.unwrap();
        prefs
            .set("Sent", SortPatch::dir(SortDirection::Descending))
            .await
            .unwrap();
        prefs.set("INBOX", SortPatch::by(SortBy::SUBJECT)).await.unwrap();
        prefs
            .set("2024", SortPatch::by(SortBy::SIZE).with_dir(SortDirection::Ascending))
            .await
            .unwrap();

        let reloaded = store(&backend).await;
        assert_eq!(reloaded.get("INBOX").sort_by, Some(SortBy::SUBJECT));
        assert_eq!(reloaded.get("INBOX").sort_dir, None);
        assert_eq!(reloaded.get("Sent").sort_dir, Some(SortDirection::Descending));
        assert_eq!(reloaded.get("2024").sort_by, Some(SortBy::SIZE));
        assert_eq!(reloaded.get("2024").sort_dir, Some(SortDirection::Ascending));

        let order: Vec<String> = reloaded.iter().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(order, vec!["INBOX", "Sent", "2024"]);
    }

    #[tokio::test]
    async fn test_empty_patch_is_noop() {
        let backend = memory();
        let mut prefs = store(&backend).await;

        prefs.set("INBOX", SortPatch::default()).await.unwrap();

        assert!(!prefs.contains("INBOX"));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let prefs = store(&memory()).await;

        assert_eq!(prefs.get("Nowhere"), SortSpec::new("Nowhere"));
        assert!(!prefs.contains("Nowhere"));
        assert!(prefs.is_empty());
    }

    #[tokio::test]
    async fn test_delete_twice_persists_once() {
        let backend = preloaded(r#"a:2:{s:5:"INBOX";a:1:{s:1:"b";i:3;}s:4:"Junk";a:1:{s:1:"d";i:1;}}"#);
        let mut prefs = store(&backend).await;

        assert!(prefs.delete("Junk").await.unwrap());
        assert!(!prefs.delete("Junk").await.unwrap());

        assert_eq!(backend.write_count(), 1);
        assert!(!prefs.contains("Junk"));
        assert_eq!(
            backend.stored_value(SORTPREF).await.unwrap(),
            r#"a:1:{s:5:"INBOX";a:1:{s:1:"b";i:3;}}"#
        );
    }

    #[tokio::test]
    async fn test_untouched_entries_round_trip() {
        let original = r#"a:2:{s:6:"Drafts";a:3:{s:1:"b";i:7;s:1:"d";b:1;s:1:"x";s:3:"foo";}s:5:"INBOX";a:1:{s:1:"b";i:1;}}"#;
        let backend = preloaded(original);
        let mut prefs = store(&backend).await;

        prefs
            .set("INBOX", SortPatch::dir(SortDirection::Descending))
            .await
            .unwrap();

        let blob = backend.stored_value(SORTPREF).await.unwrap();
        assert_eq!(
            blob,
            r#"a:2:{s:6:"Drafts";a:3:{s:1:"b";i:7;s:1:"d";b:1;s:1:"x";s:3:"foo";}s:5:"INBOX";a:2:{s:1:"b";i:1;s:1:"d";i:1;}}"#
        );
        assert_eq!(prefs.get("Drafts").sort_dir, Some(SortDirection::Descending));
    }

    #[tokio::test]
    async fn test_malformed_values_load_empty() {
        for blob in [
            "i:5;",
            "s:4:\"INBOX\";",
            r#"a:1:{s:5:"INBOX";O:8:"stdClass":1:{s:1:"b";i:2;}}"#,
            "not serialized at all",
            "a:1:{s:5:\"INBOX\";",
        ] {
            let prefs = store(&preloaded(blob)).await;
            assert!(prefs.is_empty(), "expected empty store for {:?}", blob);
        }
    }

    #[tokio::test]
    async fn test_non_array_entries_read_as_absent() {
        let prefs = store(&preloaded(r#"a:1:{s:5:"INBOX";s:3:"abc";}"#)).await;

        assert!(prefs.contains("INBOX"));
        assert_eq!(prefs.get("INBOX"), SortSpec::new("INBOX"));
    }

    #[tokio::test]
    async fn test_hook_overrides_fields() {
        let backend = preloaded(r#"a:1:{s:5:"INBOX";a:1:{s:1:"b";i:3;}}"#);
        let hooks = Hooks::builder()
            .mbox_sort(|spec: &mut SortSpec| -> Result<()> {
                spec.sort_dir = Some(SortDirection::Descending);
                Ok(())
            })
            .build();
        let prefs = SortPrefs::load(backend.clone(), hooks).await.unwrap();

        let spec = prefs.get("INBOX");
        assert_eq!(spec.sort_by, Some(SortBy::IMAP_DATE));
        assert_eq!(spec.sort_dir, Some(SortDirection::Descending));
    }

    #[tokio::test]
    async fn test_failing_hook_leaves_spec_unchanged() {
        let backend = preloaded(r#"a:1:{s:5:"INBOX";a:1:{s:1:"b";i:3;}}"#);
        let hooks = Hooks::builder()
            .mbox_sort(|spec: &mut SortSpec| -> Result<()> {
                spec.sort_by = Some(SortBy::THREAD);
                Err(Error::Hook("site hook exploded".to_string()))
            })
            .build();
        let prefs = SortPrefs::load(backend.clone(), hooks).await.unwrap();

        assert_eq!(prefs.get("INBOX").sort_by, Some(SortBy::IMAP_DATE));
    }

    #[tokio::test]
    async fn test_locked_preference() {
        let backend = Arc::new(MemoryPrefs::new(Default::default(), vec![SORTPREF.to_string()]));
        let mut prefs = SortPrefs::load(backend.clone(), Hooks::none()).await.unwrap();

        assert!(prefs.locked());
        prefs.set("INBOX", SortPatch::by(SortBy::DATE)).await.unwrap();

        assert_eq!(backend.stored_value(SORTPREF).await, None);
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn test_migrate_legacy_value() {
        assert_eq!(SortPrefs::migrate_legacy_value(1), Some(SortBy::SEQUENCE));
        assert_eq!(SortPrefs::migrate_legacy_value(2), Some(SortBy::DATE));
        assert_eq!(SortPrefs::migrate_legacy_value(161), Some(SortBy::THREAD));

        for code in [0, -1, -161, 3, 9, 10, 100, 160, 162, i64::MAX, i64::MIN] {
            assert_eq!(SortPrefs::migrate_legacy_value(code), None, "code {}", code);
        }
    }

    #[tokio::test]
    async fn test_upgrade_rewrites_sortby_only() {
        let backend = preloaded(r#"a:1:{s:4:"Sent";a:2:{s:1:"b";i:1;s:1:"d";i:1;}}"#);
        let mut prefs = store(&backend).await;

        assert!(prefs.upgrade().await.unwrap());

        let spec = prefs.get("Sent");
        assert_eq!(spec.sort_by, Some(SortBy::SEQUENCE));
        assert_eq!(spec.sort_dir, Some(SortDirection::Descending));
        assert_eq!(
            backend.stored_value(SORTPREF).await.unwrap(),
            r#"a:1:{s:4:"Sent";a:2:{s:1:"b";i:10;s:1:"d";i:1;}}"#
        );
    }

    #[tokio::test]
    async fn test_upgrade_persists_once_and_is_idempotent() {
        let backend = preloaded(
            r#"a:4:{s:5:"INBOX";a:1:{s:1:"b";i:2;}s:4:"Sent";a:1:{s:1:"b";i:161;}s:5:"Trash";a:1:{s:1:"b";i:7;}s:4:"Junk";a:1:{s:1:"d";i:0;}}"#,
        );
        let mut prefs = store(&backend).await;

        prefs.upgrade().await.unwrap();
        assert_eq!(backend.write_count(), 1);
        let once = backend.stored_value(SORTPREF).await.unwrap();

        prefs.upgrade().await.unwrap();
        let twice = backend.stored_value(SORTPREF).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(prefs.get("INBOX").sort_by, Some(SortBy::DATE));
        assert_eq!(prefs.get("Sent").sort_by, Some(SortBy::THREAD));
        assert_eq!(prefs.get("Trash").sort_by, Some(SortBy::SUBJECT));
        assert_eq!(prefs.get("Junk").sort_by, None);
    }

    #[tokio::test]
    async fn test_upgrade_skipped_for_default_preference() {
        let backend = memory();
        let mut prefs = store(&backend).await;

        assert!(!prefs.upgrade().await.unwrap());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_gc_removes_missing_and_search_mailboxes() {
        let backend = preloaded(
            r#"a:4:{s:1:"A";a:1:{s:1:"b";i:3;}s:1:"B";a:1:{s:1:"b";i:3;}s:1:"C";a:1:{s:1:"b";i:3;}s:1:"V";a:1:{s:1:"d";i:1;}}"#,
        );
        let mut prefs = store(&backend).await;
        let resolver = MailboxList::new()
            .with_folder("A")
            .with_query("C")
            .with_virtual_folder("V");

        let removed = prefs.gc(&resolver).await.unwrap();

        assert_eq!(removed, 2);
        let left: Vec<String> = prefs.iter().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(left, vec!["A", "V"]);
        // Each removal is persisted on its own
        assert_eq!(backend.write_count(), 2);
    }

    #[tokio::test]
    async fn test_gc_on_empty_store() {
        let backend = memory();
        let mut prefs = store(&backend).await;

        assert_eq!(prefs.gc(&MailboxList::new()).await.unwrap(), 0);
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_defaults() {
        let backend = Arc::new(MemoryPrefs::default().with_value("sortby", "100"));
        let prefs = store(&backend).await;

        let defaults = prefs.defaults().await.unwrap();
        assert_eq!(defaults.sort_by, SortBy::DATE);
        assert_eq!(defaults.sort_dir, SortDirection::Ascending);

        let spec = prefs.get("INBOX");
        assert_eq!(spec.effective(&defaults), (SortBy::DATE, SortDirection::Ascending));
    }

    #[tokio::test]
    async fn test_read_error_is_returned_and_nothing_written() {
        let backend = Arc::new(UnreadablePrefs::default());
        let result = SortPrefs::load(backend.clone(), Hooks::none()).await;

        match result {
            Err(e) => assert_eq!(e.code(), "DATABASE_ERROR"),
            Ok(_) => panic!("load succeeded on an unreadable backend"),
        }
        assert!(backend.writes.lock().unwrap().is_empty());
    }
}
