//! Active Language: the ambient language of the current request.
//!
//! The value lives in a tokio task-local, so concurrent requests on the
//! same worker thread never observe each other's language. A scope must be
//! established with [`scope`] (async) or [`sync_scope`] before the other
//! functions have any effect; outside a scope they are no-ops.

use std::cell::RefCell;
use std::future::Future;

use tracing::trace;

use super::Language;

tokio::task_local! {
    static ACTIVE_LANGUAGE: RefCell<Option<Language>>;
}

/// Run `future` inside a fresh scope with no active language.
pub async fn scope<F: Future>(future: F) -> F::Output {
    ACTIVE_LANGUAGE.scope(RefCell::new(None), future).await
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
    ACTIVE_LANGUAGE.sync_scope(RefCell::new(None), f)
}

/// The currently active language, if any.
pub fn get_language() -> Option<Language> {
    ACTIVE_LANGUAGE
        .try_with(|cell| cell.borrow().clone())
        .unwrap_or_else(|_| {
            trace!("get_language called outside of a language scope");
            None
        })
}

/// Make `language` the active language for the rest of the scope.
pub fn activate(language: &Language) {
    replace(Some(language.clone()));
}

/// Clear the active language.
pub fn deactivate() {
    replace(None);
}

/// Swap the active language, returning the previous value.
fn replace(value: Option<Language>) -> Option<Language> {
    ACTIVE_LANGUAGE
        .try_with(|cell| cell.replace(value))
        .unwrap_or_else(|_| {
            trace!("language change ignored outside of a language scope");
            None
        })
}

/// Guard returned by [`override_language`].
///
/// Restores the language that was active before the override when dropped,
/// including when the stack unwinds.
#[must_use = "the override is undone as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LanguageOverride {
    previous: Option<Language>,
}

/// Temporarily activate `language` until the returned guard is dropped.
///
/// # Example
/// ```
/// use i18n_url::i18n::{context, LanguageRegistry};
///
/// let registry = LanguageRegistry::default();
/// let fr = registry.language("fr").unwrap();
///
/// context::sync_scope(|| {
///     {
///         let _guard = context::override_language(&fr);
///         assert_eq!(context::get_language(), Some(fr.clone()));
///     }
///     assert_eq!(context::get_language(), None);
/// });
/// ```
pub fn override_language(language: &Language) -> LanguageOverride {
    LanguageOverride {
        previous: replace(Some(language.clone())),
    }
}

impl Drop for LanguageOverride {
    fn drop(&mut self) {
        replace(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(code: &str) -> Language {
        Language::new(code)
    }

    #[test]
    fn test_outside_scope_is_noop() {
        activate(&lang("fr"));
        assert_eq!(get_language(), None);
        let _guard = override_language(&lang("en"));
        assert_eq!(get_language(), None);
    }

    #[test]
    fn test_activate_and_deactivate() {
        sync_scope(|| {
            assert_eq!(get_language(), None);
            activate(&lang("fr"));
            assert_eq!(get_language(), Some(lang("fr")));
            deactivate();
            assert_eq!(get_language(), None);
        });
    }

    #[test]
    fn test_override_restores_previous() {
        sync_scope(|| {
            activate(&lang("en"));
            {
                let _guard = override_language(&lang("fr"));
                assert_eq!(get_language(), Some(lang("fr")));
            }
            assert_eq!(get_language(), Some(lang("en")));
        });
    }

    #[test]
    fn test_nested_overrides() {
        sync_scope(|| {
            let outer = override_language(&lang("fr"));
            let inner = override_language(&lang("de"));
            assert_eq!(get_language(), Some(lang("de")));
            drop(inner);
            assert_eq!(get_language(), Some(lang("fr")));
            drop(outer);
            assert_eq!(get_language(), None);
        });
    }

    #[test]
    fn test_override_restored_on_panic() {
        sync_scope(|| {
            activate(&lang("en"));
            let result = std::panic::catch_unwind(|| {
                let _guard = override_language(&lang("fr"));
                panic!("boom");
            });
            assert!(result.is_err());
            assert_eq!(get_language(), Some(lang("en")));
        });
    }

    #[tokio::test]
    async fn test_scopes_are_isolated_between_tasks() {
        let first = tokio::spawn(scope(async {
            activate(&lang("fr"));
            tokio::task::yield_now().await;
            get_language()
        }));
        let second = tokio::spawn(scope(async {
            tokio::task::yield_now().await;
            get_language()
        }));

        assert_eq!(first.await.unwrap(), Some(lang("fr")));
        assert_eq!(second.await.unwrap(), None);
    }
}
