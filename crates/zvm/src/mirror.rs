//! Mirror strategy (§4.5).

use url::Url;

use crate::error::{Result, ZvmError};

/// One candidate host serving byte-identical artifacts.
#[derive(Clone, Debug)]
pub struct Mirror {
    pub base_url: Url,
    pub label: String,
}

/// The ordered list of mirrors to try for one install attempt, plus the
/// primary upstream. `ZVM_MIRROR` (read by the caller) rotates the starting
/// point via [`MirrorList::starting_at`].
#[derive(Clone, Debug)]
pub struct MirrorList {
    primary: Mirror,
    mirrors: Vec<Mirror>,
}

impl MirrorList {
    pub fn new(primary: Mirror, mirrors: Vec<Mirror>) -> Self {
        Self { primary, mirrors }
    }

    /// Candidates in attempt order, starting from `offset` (0 = primary
    /// first, then mirrors in order; any other offset rotates the mirror
    /// list to start there, primary always tried last in that case).
    pub fn candidates(&self, offset: usize) -> Vec<&Mirror> {
        if self.mirrors.is_empty() || offset == 0 {
            let mut v = vec![&self.primary];
            v.extend(self.mirrors.iter());
            return v;
        }
        let start = offset.min(self.mirrors.len()) - 1;
        let mut v: Vec<&Mirror> = self.mirrors[start..].iter().collect();
        v.extend(self.mirrors[..start].iter());
        v.push(&self.primary);
        v
    }

    /// Build the per-attempt URL: the primary is used as-is (its own
    /// absolute URL); for a named mirror, the host portion is replaced
    /// while path and filename are preserved.
    pub fn candidate_url(&self, mirror: &Mirror, manifest_url: &Url) -> Result<Url> {
        if std::ptr::eq(mirror, &self.primary) {
            return Ok(manifest_url.clone());
        }
        let mut rewritten = mirror.base_url.clone();
        rewritten.set_path(manifest_url.path());
        rewritten.set_query(manifest_url.query());
        Ok(rewritten)
    }
}

/// Read `ZVM_MIRROR` (a 0-based index) to decide which offset to start the
/// rotation at. Absent or invalid, installs start at the primary.
pub fn starting_offset_from_env() -> usize {
    std::env::var("ZVM_MIRROR")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
}

/// Run `attempt` against each mirror candidate in turn, advancing on
/// mirror-retryable errors (§4.5 step 2) and surfacing immediately on a
/// trust error (§4.5 step 3) or once the list is exhausted.
pub async fn try_mirrors<'a, T, F, Fut>(
    list: &'a MirrorList,
    offset: usize,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(&'a Mirror) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let candidates = list.candidates(offset);
    let mut last_err: Option<ZvmError> = None;

    for (index, mirror) in candidates.into_iter().enumerate() {
        match attempt(mirror).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_mirror_retryable() => {
                tracing::warn!(mirror = %mirror.label, error = %err, "mirror attempt failed, advancing");
                last_err = Some(ZvmError::MirrorAttemptFailed {
                    mirror_index: index,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                return Err(ZvmError::MirrorAttemptFailed {
                    mirror_index: index,
                    source: Box::new(err),
                })
            }
        }
    }

    Err(last_err.unwrap_or(ZvmError::UsageError("no mirrors configured".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror(label: &str, host: &str) -> Mirror {
        Mirror {
            base_url: Url::parse(&format!("https://{host}")).unwrap(),
            label: label.to_string(),
        }
    }

    #[test]
    fn candidates_default_to_primary_first() {
        let list = MirrorList::new(mirror("primary", "origin.example"), vec![mirror("a", "a.example")]);
        let c = list.candidates(0);
        assert_eq!(c[0].label, "primary");
        assert_eq!(c[1].label, "a");
    }

    #[test]
    fn candidate_url_preserves_path_for_mirrors() {
        let list = MirrorList::new(
            mirror("primary", "origin.example"),
            vec![mirror("mirror-a", "mirror-a.example")],
        );
        let manifest_url = Url::parse("https://origin.example/releases/0.13.0/file.tar.xz").unwrap();
        let rewritten = list
            .candidate_url(&list.mirrors[0], &manifest_url)
            .unwrap();
        assert_eq!(rewritten.host_str(), Some("mirror-a.example"));
        assert_eq!(rewritten.path(), "/releases/0.13.0/file.tar.xz");
    }

    #[tokio::test]
    async fn retryable_errors_advance_to_next_mirror() {
        let list = MirrorList::new(mirror("primary", "origin.example"), vec![mirror("a", "a.example")]);
        let mut calls = Vec::new();
        let result: Result<()> = try_mirrors(&list, 0, |m| {
            calls.push(m.label.clone());
            let label = m.label.clone();
            async move {
                if label == "primary" {
                    Err(ZvmError::IncorrectSize { expected: 1, actual: 2 })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, vec!["primary", "a"]);
    }

    #[tokio::test]
    async fn trust_errors_do_not_advance() {
        let list = MirrorList::new(mirror("primary", "origin.example"), vec![mirror("a", "a.example")]);
        let mut calls = Vec::new();
        let result: Result<()> = try_mirrors(&list, 0, |m| {
            calls.push(m.label.clone());
            async move { Err(ZvmError::SignatureVerificationFailed) }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.mirror_index(), Some(0));
        assert!(matches!(err, ZvmError::MirrorAttemptFailed { source, .. } if matches!(*source, ZvmError::SignatureVerificationFailed)));
        assert_eq!(calls, vec!["primary"]);
    }
}
