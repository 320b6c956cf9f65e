//! Constants for file extensions and resolution order.
//!
//! Extension handling lives here so extraction, resolution and scanning agree
//! on what counts as a tracked module.
//!
//! ## Supported Extensions
//!
//! - **JavaScript**: `.js`, `.jsx`
//! - **TypeScript**: `.ts`, `.tsx`
//! - **Vue single-file components**: `.vue` (only `<script>` blocks are scanned)

/// Extensions whose whole text is scanned for `import`/`require` statements
pub const PATTERN_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx"];

/// Template-style extension whose embedded script blocks are scanned
pub const VUE_EXTENSION: &str = ".vue";

/// Extensions to try when resolving module imports (in priority order).
///
/// The same order is used for `<path>/index<ext>` probing.
pub const RESOLVE_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".vue"];

/// Number of entries kept in the most-imported / most-importing lists
pub const TOP_NODE_LIMIT: usize = 5;
