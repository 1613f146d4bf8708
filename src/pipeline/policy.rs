//! Per-operation failure policy.
//!
//! Every fallible step of a novel run is named here together with what a failure means.
//! Steps whose failure is absorbed (cover, illustrations) pass their result through
//! [settle]; fatal steps propagate with `?` and end the novel at its current stage.

/// A fallible step in one novel's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListingFetch,
    ListingParse,
    Scaffold,
    CoverFetch,
    CoverParse,
    ChapterFetch,
    ChapterParse,
    IllustrationFetch,
    IllustrationWrite,
    Assemble,
    Archive,
}

/// What a failure of an [Operation] does to the owning novel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the novel. Sibling novels keep running.
    FatalToNovel,
    /// Log at WARN and drop the single resource.
    LogAndContinue,
    /// Log and substitute a bundled default.
    Fallback,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::ListingFetch,
        Operation::ListingParse,
        Operation::Scaffold,
        Operation::CoverFetch,
        Operation::CoverParse,
        Operation::ChapterFetch,
        Operation::ChapterParse,
        Operation::IllustrationFetch,
        Operation::IllustrationWrite,
        Operation::Assemble,
        Operation::Archive,
    ];
}

pub fn policy_for(op: Operation) -> FailurePolicy {
    match op {
        Operation::CoverFetch | Operation::CoverParse => FailurePolicy::Fallback,
        Operation::IllustrationFetch | Operation::IllustrationWrite => {
            FailurePolicy::LogAndContinue
        }
        Operation::ListingFetch
        | Operation::ListingParse
        | Operation::Scaffold
        | Operation::ChapterFetch
        | Operation::ChapterParse
        | Operation::Assemble
        | Operation::Archive => FailurePolicy::FatalToNovel,
    }
}

/// Apply the policy for `op` to `result`.
///
/// Fatal failures propagate unchanged. Other failures are logged against `novel` and
/// become `Ok(None)`; the caller drops the resource or substitutes its default.
pub fn settle<T, E: std::fmt::Display>(
    op: Operation,
    novel: &str,
    result: Result<T, E>,
) -> Result<Option<T>, E> {
    let err = match result {
        Ok(value) => return Ok(Some(value)),
        Err(e) => e,
    };
    match policy_for(op) {
        FailurePolicy::FatalToNovel => Err(err),
        FailurePolicy::LogAndContinue => {
            tracing::warn!(novel, operation = ?op, error = %err, "failed; skipping resource");
            Ok(None)
        }
        FailurePolicy::Fallback => {
            tracing::warn!(novel, operation = ?op, error = %err, "failed; using default");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_propagates_fatal_and_swallows_the_rest() {
        let fatal: Result<Option<u8>, String> =
            settle(Operation::ChapterParse, "n", Err("boom".to_string()));
        assert_eq!(fatal, Err("boom".to_string()));

        let dropped: Result<Option<u8>, String> =
            settle(Operation::IllustrationFetch, "n", Err("reset".to_string()));
        assert_eq!(dropped, Ok(None));

        let fallback: Result<Option<u8>, String> =
            settle(Operation::CoverFetch, "n", Err("404".to_string()));
        assert_eq!(fallback, Ok(None));

        let ok: Result<Option<u8>, String> = settle(Operation::Archive, "n", Ok(7));
        assert_eq!(ok, Ok(Some(7)));
    }

    #[test]
    fn cover_failures_fall_back() {
        assert_eq!(policy_for(Operation::CoverFetch), FailurePolicy::Fallback);
        assert_eq!(policy_for(Operation::CoverParse), FailurePolicy::Fallback);
    }

    #[test]
    fn illustration_failures_are_dropped() {
        assert_eq!(
            policy_for(Operation::IllustrationFetch),
            FailurePolicy::LogAndContinue
        );
        assert_eq!(
            policy_for(Operation::IllustrationWrite),
            FailurePolicy::LogAndContinue
        );
    }

    #[test]
    fn everything_else_is_fatal() {
        let fatal: Vec<Operation> = Operation::ALL
            .iter()
            .copied()
            .filter(|op| policy_for(*op) == FailurePolicy::FatalToNovel)
            .collect();
        assert_eq!(
            fatal,
            vec![
                Operation::ListingFetch,
                Operation::ListingParse,
                Operation::Scaffold,
                Operation::ChapterFetch,
                Operation::ChapterParse,
                Operation::Assemble,
                Operation::Archive,
            ]
        );
    }
}
