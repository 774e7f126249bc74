//! Utilities for rewriting module-boundary syntax in JS code.
//!
//! The crate converts between the two Node.js module systems in both
//! directions: `require`/`module.exports`/`exports`/`__filename`/`__dirname`
//! idioms become `import`/`export`/`import.meta` idioms and back. It also
//! rewrites module-specifier string literals wherever they occur
//! syntactically, independent of the structural transform.
//!
//! Transformation is span-based: the parsed tree is never mutated, every
//! rewrite is a byte-range edit over the original text, and unrecognized
//! shapes are left alone rather than guessed; a no-op is always
//! semantically safer than an incorrect rewrite.
//!
//! The building blocks are exposed on their own:
//!
//! - [`collect_module_identifiers`] resolves module-scope declarations and
//!   the reads that refer to them, honoring hoisting, shadowing and TDZ
//!   rules.
//! - [`collect_cjs_exports`] statically reconstructs the CommonJS export
//!   table from arbitrary assignment/helper-call patterns.
//! - [`update_specifiers`] enumerates every import/require-like string
//!   position and lets a callback rewrite it in place.
//! - [`PatchBuffer`] is the span-edit engine the transforms are built on.
//!
//! # Examples
//!
//! ```
//! use js_module_syntax::{transform, Dialect, Target, TransformOptions};
//!
//! let src = "const path = require('node:path');\nexports.basename = file => path.basename(file);\n";
//! let options = TransformOptions {
//!     target: Target::Module,
//!     transform_syntax: true,
//!     ..Default::default()
//! };
//! let out = transform(src, Dialect::Js, &options).unwrap();
//!
//! assert!(out.contains("import path from 'node:path';"));
//! assert!(!out.contains("require("));
//! ```

mod exports;
mod parse;
mod patch;
mod scope;
mod specifier;
mod transform;
mod walk;

pub use exports::{collect_cjs_exports, ExportEntry, ExportVia, ExportWrite};
pub use patch::{PatchBuffer, RangeConflict};
pub use scope::{collect_module_identifiers, IdentifierMeta, ResolverOptions};
pub use specifier::{update_specifiers, Specifier, SpecifierContext, SpecifierKind};
pub use transform::{
    CjsDefault, ImportMetaMain, LiveBindings, SpecifierRewrite, Target, TopLevelAwait,
    TransformError, TransformOptions, UnsupportedConstruct,
};

/// The source dialect, selecting the parser syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Js,
    Jsx,
    Ts,
    Tsx,
}

/// Transforms `src` into the module system selected by
/// [`TransformOptions::target`].
///
/// With [`transform_syntax`](TransformOptions::transform_syntax) disabled
/// (the default), only bare module-scope globals are rewritten
/// (`__filename` ↔ `import.meta.filename` and friends) and import/export
/// structure is left untouched. With it enabled, the full lowering runs:
/// imports/exports are synthesized in the target system's syntax, using the
/// scope resolver and the CJS export table to preserve the source module's
/// export surface.
///
/// Fails without partial output when the source cannot be represented in
/// the target system (see [`TransformError::Unsupported`]).
pub fn transform(
    src: &str,
    dialect: Dialect,
    options: &TransformOptions,
) -> Result<String, TransformError> {
    let module = parse::parse_module(src, dialect)?;
    match options.target {
        Target::CommonJs => transform::esm_to_cjs(src, &module, options),
        Target::Module => transform::cjs_to_esm(src, &module, options),
    }
}
