use lazy_static::lazy_static;
use log::trace;
use regex::Regex;
use std::collections::HashSet;

use crate::{
    config::ExtractorKind,
    constants::{PATTERN_EXTENSIONS, VUE_EXTENSION},
    parser::AstExtractor,
};

lazy_static! {
    static ref ES_IMPORT_RE: Regex =
        Regex::new(r#"import\s+.*\s+from\s+['"]([^'"]+)['"]"#).expect("valid ES import regex");
    static ref REQUIRE_RE: Regex =
        Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid require regex");
    static ref SCRIPT_BLOCK_RE: Regex =
        Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("valid script block regex");
}

/// Produces the distinct raw import strings referenced by one file.
///
/// Implementations never touch the filesystem and never fail: text they
/// cannot make sense of simply yields fewer imports. The result has set
/// semantics and keeps first-seen order so graph building stays deterministic.
pub trait ImportExtractor: Send + Sync {
    fn extract(&self, source: &str, extension: &str) -> Vec<String>;
}

/// Regular-expression extractor for ES `import … from` and CommonJS `require`.
///
/// Approximate by nature: it can match inside comments or strings and misses
/// unusual syntax such as multi-line import clauses.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

impl ImportExtractor for PatternExtractor {
    fn extract(&self, source: &str, extension: &str) -> Vec<String> {
        let mut imports = ImportSet::default();

        if PATTERN_EXTENSIONS.contains(&extension) {
            scan_patterns(source, &mut imports);
        } else if extension == VUE_EXTENSION {
            for block in script_blocks(source) {
                scan_patterns(block, &mut imports);
            }
        }

        imports.into_vec()
    }
}

fn scan_patterns(text: &str, imports: &mut ImportSet) {
    for cap in ES_IMPORT_RE.captures_iter(text) {
        trace!("Found import pattern: '{}'", &cap[1]);
        imports.insert(&cap[1]);
    }
    for cap in REQUIRE_RE.captures_iter(text) {
        trace!("Found require pattern: '{}'", &cap[1]);
        imports.insert(&cap[1]);
    }
}

/// Interiors of every `<script …>…</script>` region of a template file.
pub fn script_blocks(source: &str) -> Vec<&str> {
    SCRIPT_BLOCK_RE
        .captures_iter(source)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect()
}

/// Insertion-ordered set of import strings.
#[derive(Debug, Default)]
pub(crate) struct ImportSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl ImportSet {
    pub(crate) fn insert(&mut self, request: &str) {
        if self.seen.insert(request.to_string()) {
            self.ordered.push(request.to_string());
        }
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}

/// Build the extractor selected in the configuration.
pub fn extractor_for(kind: ExtractorKind) -> Box<dyn ImportExtractor> {
    match kind {
        ExtractorKind::Pattern => Box::new(PatternExtractor),
        ExtractorKind::Ast => Box::new(AstExtractor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_and_require() {
        let imports = PatternExtractor.extract("import {x} from './a';\nrequire('../b');", ".js");
        assert_eq!(imports, vec!["./a", "../b"]);
    }

    #[test]
    fn test_default_and_namespace_imports() {
        let src = "import React from 'react';\nimport * as utils from \"./utils\";\n";
        let imports = PatternExtractor.extract(src, ".tsx");
        assert_eq!(imports, vec!["react", "./utils"]);
    }

    #[test]
    fn test_require_with_whitespace() {
        let imports = PatternExtractor.extract("const x = require ( './spaced' );", ".js");
        assert_eq!(imports, vec!["./spaced"]);
    }

    #[test]
    fn test_import_and_require_of_same_module_collapse() {
        let src = "import a from './shared';\nconst b = require('./shared');\n";
        let imports = PatternExtractor.extract(src, ".js");
        assert_eq!(imports, vec!["./shared"]);
    }

    #[test]
    fn test_repeated_import_collapses() {
        let src = "import a from './a';\nimport { b } from './a';\n";
        assert_eq!(PatternExtractor.extract(src, ".ts"), vec!["./a"]);
    }

    #[test]
    fn test_side_effect_import_not_matched() {
        // The ES pattern needs a `from` clause
        assert!(PatternExtractor.extract("import './polyfills';", ".js").is_empty());
    }

    #[test]
    fn test_unrecognized_extension_is_empty() {
        assert!(PatternExtractor.extract("import a from './a';", ".md").is_empty());
        assert!(PatternExtractor.extract("import a from './a';", "").is_empty());
    }

    #[test]
    fn test_malformed_input_does_not_panic() {
        let imports = PatternExtractor.extract("import from from from ''' require((", ".js");
        assert!(imports.is_empty());
    }

    #[test]
    fn test_vue_only_scans_script_blocks() {
        let src = r#"<template>
  <div>import fake from './not-a-module'</div>
</template>
<script>
import Child from './Child.vue';
const api = require('../api');
</script>
<script setup lang="ts">
import { ref } from 'vue';
</script>
"#;
        let imports = PatternExtractor.extract(src, ".vue");
        assert_eq!(imports, vec!["./Child.vue", "../api", "vue"]);
    }

    #[test]
    fn test_vue_without_script_is_empty() {
        let src = "<template><p>import x from './x'</p></template>";
        assert!(PatternExtractor.extract(src, ".vue").is_empty());
    }

    #[test]
    fn test_script_blocks() {
        let blocks = script_blocks("<script>a</script><b/><script lang=\"ts\">\nb\n</script>");
        assert_eq!(blocks, vec!["a", "\nb\n"]);
    }

    #[test]
    fn test_extractor_for_kind() {
        let pattern = extractor_for(ExtractorKind::Pattern);
        assert_eq!(pattern.extract("import a from './a';", ".js"), vec!["./a"]);
        let ast = extractor_for(ExtractorKind::Ast);
        assert_eq!(ast.extract("import a from './a';", ".js"), vec!["./a"]);
    }
}
