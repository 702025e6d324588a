//! Hook registry

use impmail_common::headers::MessageHeaders;
use impmail_common::types::SortSpec;
use impmail_common::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Adjusts the sort specification of a mailbox as it is read
pub trait MboxSortHook: Send + Sync {
    fn call(&self, spec: &mut SortSpec) -> Result<()>;
}

impl<F> MboxSortHook for F
where
    F: Fn(&mut SortSpec) -> Result<()> + Send + Sync,
{
    fn call(&self, spec: &mut SortSpec) -> Result<()> {
        self(spec)
    }
}

/// Decides whether the user must confirm sending an MDN
pub trait MdnCheckHook: Send + Sync {
    fn call(&self, headers: &MessageHeaders) -> Result<bool>;
}

impl<F> MdnCheckHook for F
where
    F: Fn(&MessageHeaders) -> Result<bool> + Send + Sync,
{
    fn call(&self, headers: &MessageHeaders) -> Result<bool> {
        self(headers)
    }
}

/// Registered hooks
#[derive(Clone, Default)]
pub struct Hooks {
    mbox_sort: Option<Arc<dyn MboxSortHook>>,
    mdn_check: Option<Arc<dyn MdnCheckHook>>,
}

impl Hooks {
    /// Registry with nothing registered
    pub fn none() -> Self {
        Self::default()
    }

    pub fn builder() -> HooksBuilder {
        HooksBuilder::default()
    }

    /// Run the `mbox_sort` hook
    pub fn call_mbox_sort(&self, spec: &mut SortSpec) -> Result<()> {
        let hook = self.mbox_sort.as_ref().ok_or(Error::HookNotSet("mbox_sort"))?;
        debug!(mailbox = %spec.mailbox, "Calling mbox_sort hook");
        hook.call(spec)
    }

    /// Run the `mdn_check` hook
    pub fn call_mdn_check(&self, headers: &MessageHeaders) -> Result<bool> {
        let hook = self.mdn_check.as_ref().ok_or(Error::HookNotSet("mdn_check"))?;
        debug!("Calling mdn_check hook");
        hook.call(headers)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("mbox_sort", &self.mbox_sort.is_some())
            .field("mdn_check", &self.mdn_check.is_some())
            .finish()
    }
}

/// Builder for [`Hooks`]
#[derive(Default)]
pub struct HooksBuilder {
    hooks: Hooks,
}

impl HooksBuilder {
    pub fn mbox_sort(mut self, hook: impl MboxSortHook + 'static) -> Self {
        self.hooks.mbox_sort = Some(Arc::new(hook));
        self
    }

    pub fn mdn_check(mut self, hook: impl MdnCheckHook + 'static) -> Self {
        self.hooks.mdn_check = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Hooks {
        self.hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impmail_common::types::SortBy;

    #[test]
    fn test_unregistered_hooks() {
        let hooks = Hooks::none();
        let mut spec = SortSpec::new("INBOX");

        let err = hooks.call_mbox_sort(&mut spec).unwrap_err();
        assert!(err.is_hook_not_set());
        assert!(hooks
            .call_mdn_check(&MessageHeaders::new())
            .unwrap_err()
            .is_hook_not_set());
    }

    #[test]
    fn test_closure_hooks() {
        let hooks = Hooks::builder()
            .mbox_sort(|spec: &mut SortSpec| -> Result<()> {
                if spec.mailbox == "Drafts" {
                    spec.sort_by = Some(SortBy::DATE);
                }
                Ok(())
            })
            .mdn_check(|headers: &MessageHeaders| -> Result<bool> { Ok(headers.contains("x-ask")) })
            .build();

        let mut spec = SortSpec::new("Drafts");
        hooks.call_mbox_sort(&mut spec).unwrap();
        assert_eq!(spec.sort_by, Some(SortBy::DATE));

        assert!(hooks
            .call_mdn_check(&MessageHeaders::new().with("X-Ask", "1"))
            .unwrap());
        assert!(!hooks.call_mdn_check(&MessageHeaders::new()).unwrap());
        assert_eq!(
            format!("{:?}", hooks),
            "Hooks { mbox_sort: true, mdn_check: true }"
        );
    }
}
