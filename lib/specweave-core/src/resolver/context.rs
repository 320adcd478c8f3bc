use std::collections::HashMap;
use std::sync::Arc;

use crate::document::Node;
use crate::{BundleError, Source, Target};

/// Per-run state: targets being resolved, decoded sources and load statistics.
///
/// The root document sits at the bottom of the stack, so the current depth is the number
/// of frames above it.
#[derive(Debug, Default)]
pub(crate) struct ResolutionContext {
    stack: Vec<Target>,
    cache: HashMap<Source, Arc<Node>>,
    loads: usize,
}

impl ResolutionContext {
    pub(crate) fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    pub(crate) fn push(&mut self, target: Target) {
        self.stack.push(target);
    }

    pub(crate) fn pop(&mut self) {
        self.stack.pop();
    }

    /// Rejects `target` when following it would loop.
    ///
    /// Jumping to another document is circular when that document is already being
    /// resolved. Jumping within the current document is circular only when the very
    /// same fragment is already being resolved.
    pub(crate) fn check_cycle(&self, target: &Target, current: &Source) -> Result<(), BundleError> {
        let circular = if &target.source == current {
            self.stack.contains(target)
        } else {
            self.stack.iter().any(|entry| entry.source == target.source)
        };

        if circular {
            let chain = self
                .stack
                .iter()
                .chain(std::iter::once(target))
                .map(ToString::to_string)
                .collect();
            return Err(BundleError::CircularReference { chain });
        }
        Ok(())
    }

    /// Rejects entering a frame deeper than `max_depth` (`0` is unlimited).
    pub(crate) fn check_depth(&self, max_depth: usize, target: &Target) -> Result<(), BundleError> {
        if max_depth > 0 && self.depth() + 1 > max_depth {
            return Err(BundleError::MaxDepthExceeded {
                max_depth,
                target: target.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn cached(&self, source: &Source) -> Option<Arc<Node>> {
        self.cache.get(source).cloned()
    }

    pub(crate) fn store(&mut self, source: Source, document: Arc<Node>) {
        self.loads += 1;
        self.cache.insert(source, document);
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::ErrorKind;
    use crate::fragment::Fragment;

    fn target(path: &str, fragment: &[&str]) -> Target {
        Target::new(
            Source::File(PathBuf::from(path)),
            Fragment::from_segments(fragment.iter().copied()),
        )
    }

    #[test]
    fn should_detect_document_reentry() {
        let mut context = ResolutionContext::default();
        context.push(target("/a.yaml", &[]));
        context.push(target("/b.yaml", &["x"]));

        let back = target("/a.yaml", &["y"]);
        let error = context
            .check_cycle(&back, &back_source("/b.yaml"))
            .expect_err("should be circular");

        insta::assert_snapshot!(error, @"Circular reference: /a.yaml -> /b.yaml#/x -> /a.yaml#/y");
    }

    #[test]
    fn should_allow_sibling_fragment_in_current_document() {
        let mut context = ResolutionContext::default();
        context.push(target("/main.yaml", &[]));
        context.push(target("/common.yaml", &["Pet"]));

        let sibling = target("/common.yaml", &["Category"]);
        assert!(context.check_cycle(&sibling, &back_source("/common.yaml")).is_ok());

        let itself = target("/common.yaml", &["Pet"]);
        let error = context
            .check_cycle(&itself, &back_source("/common.yaml"))
            .expect_err("self reference is circular");
        assert_eq!(error.kind(), ErrorKind::CircularReference);
    }

    #[test]
    fn should_count_depth_above_root() {
        let mut context = ResolutionContext::default();
        context.push(target("/root.yaml", &[]));
        let next = target("/d1.yaml", &[]);

        assert_eq!(context.depth(), 0);
        assert!(context.check_depth(1, &next).is_ok());
        assert!(context.check_depth(0, &next).is_ok());

        context.push(next);
        let deeper = target("/d2.yaml", &[]);
        let error = context.check_depth(1, &deeper).expect_err("too deep");
        assert_eq!(error.kind(), ErrorKind::MaxDepthExceeded);

        context.pop();
        assert_eq!(context.depth(), 0);
    }

    fn back_source(path: &str) -> Source {
        Source::File(PathBuf::from(path))
    }
}
