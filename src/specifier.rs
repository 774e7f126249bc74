use std::ops::Range;

use swc_ecma_visit::swc_ecma_ast as ast;
use swc_ecma_visit::{AstNodePath, VisitAstPath, VisitWithPath};

use crate::patch::{PatchBuffer, RangeConflict};
use crate::walk::convert_span;
use crate::{Dialect, TransformError};

/// The literal shape a module specifier was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// A plain string literal. Replacements keep the original quotes.
    StringLiteral,
    /// A template literal, treated as one opaque unit between the backticks.
    TemplateLiteral,
    /// A string concatenation chain (`'a' + ext`).
    Concatenation,
    /// A `new String(...)` wrapper.
    StringObject,
}

/// The syntactic position a specifier was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierContext {
    /// `import ... from '...'`
    Import,
    /// `export ... from '...'`
    ReExport,
    /// `export * from '...'`
    ExportAll,
    /// `import('...')`
    DynamicImport,
    /// `require('...')`
    Require,
    /// `require.resolve('...')`
    RequireResolve,
    /// `import.meta.resolve('...')`
    ImportMetaResolve,
    /// TS `import('...').T` type position.
    TsImportType,
}

/// One rewritable specifier position.
#[derive(Debug, Clone)]
pub struct Specifier {
    pub kind: SpecifierKind,
    pub context: SpecifierContext,
    /// Span of the whole literal, including quotes/backticks where present.
    pub span: Range<u32>,
    /// The literal's text: the cooked value for plain strings, the raw
    /// source text for the other shapes.
    pub value: String,
}

/// Rewrites module specifiers via a caller callback.
///
/// Every import/require-like string position is enumerated in source order
/// and passed to `callback`; returning `Some` replaces the literal in place
/// (for plain strings only the quoted content is swapped, so the original
/// quoting survives), returning `None` leaves it untouched.
///
/// Relative-path heuristics are deliberately left to the caller.
///
/// # Examples
///
/// ```
/// use js_module_syntax::{update_specifiers, Dialect};
///
/// let src = "import foo from './foo.js';\nconst bar = require('./bar.js');";
/// let out = update_specifiers(src, Dialect::Js, |spec| {
///     spec.value.strip_suffix(".js").map(|stem| format!("{stem}.mjs"))
/// })
/// .unwrap();
///
/// assert_eq!(
///     out,
///     "import foo from './foo.mjs';\nconst bar = require('./bar.mjs');"
/// );
/// ```
pub fn update_specifiers<F>(
    src: &str,
    dialect: Dialect,
    mut callback: F,
) -> Result<String, TransformError>
where
    F: FnMut(&Specifier) -> Option<String>,
{
    let module = crate::parse::parse_module(src, dialect)?;
    let sites = collect_from_module(&module, src);

    let mut patch = PatchBuffer::new(src);
    for site in &sites {
        if let Some(text) = callback(site) {
            apply(site, &text, &mut patch)?;
        }
    }
    Ok(patch.render())
}

/// Records `text` as the in-place replacement for `site`.
pub(crate) fn apply(
    site: &Specifier,
    text: &str,
    patch: &mut PatchBuffer<'_>,
) -> Result<(), RangeConflict> {
    match site.kind {
        // Swap only the quoted content so the original delimiters survive.
        SpecifierKind::StringLiteral | SpecifierKind::TemplateLiteral => {
            patch.replace(site.span.start + 1..site.span.end - 1, text)
        }
        SpecifierKind::Concatenation | SpecifierKind::StringObject => {
            patch.replace(site.span.clone(), text)
        }
    }
}

/// Rewrites a known JS-family extension on a relative specifier.
///
/// Non-relative specifiers and unknown extensions are left alone; the caller
/// decides what counts as rewritable beyond that.
pub(crate) fn rewrite_extension(value: &str, new_ext: &str) -> Option<String> {
    const EXTS: &[&str] = &[
        ".mjs", ".cjs", ".mts", ".cts", ".jsx", ".tsx", ".js", ".ts",
    ];

    if !(value.starts_with("./") || value.starts_with("../")) {
        return None;
    }
    for ext in EXTS {
        if let Some(stem) = value.strip_suffix(ext) {
            return Some(format!("{stem}{new_ext}"));
        }
    }
    None
}

pub(crate) fn collect_from_module(module: &ast::Module, src: &str) -> Vec<Specifier> {
    let mut collector = SpecifierCollector {
        src,
        sites: Vec::new(),
    };
    module.visit_children_with_path(&mut collector, &mut Default::default());
    collector.sites
}

struct SpecifierCollector<'a> {
    src: &'a str,
    sites: Vec<Specifier>,
}

impl SpecifierCollector<'_> {
    fn record_str(&mut self, context: SpecifierContext, s: &ast::Str) {
        self.sites.push(Specifier {
            kind: SpecifierKind::StringLiteral,
            context,
            span: convert_span(s.span),
            value: s.value.to_string(),
        });
    }

    /// Classifies a specifier argument by literal shape; anything else is
    /// not rewritable and stays untouched.
    fn record_expr(&mut self, context: SpecifierContext, expr: &ast::Expr) {
        match expr {
            ast::Expr::Lit(ast::Lit::Str(s)) => self.record_str(context, s),
            ast::Expr::Tpl(tpl) => {
                let span = convert_span(tpl.span);
                let value = self.src[span.start as usize + 1..span.end as usize - 1].to_string();
                self.sites.push(Specifier {
                    kind: SpecifierKind::TemplateLiteral,
                    context,
                    span,
                    value,
                });
            }
            ast::Expr::Bin(bin) if bin.op == ast::BinaryOp::Add => {
                let span = convert_span(bin.span);
                let value = self.src[span.start as usize..span.end as usize].to_string();
                self.sites.push(Specifier {
                    kind: SpecifierKind::Concatenation,
                    context,
                    span,
                    value,
                });
            }
            ast::Expr::New(new) => {
                let is_string = matches!(
                    &*new.callee,
                    ast::Expr::Ident(ident) if ident.sym.as_ref() == "String"
                );
                if is_string {
                    let span = convert_span(new.span);
                    let value = self.src[span.start as usize..span.end as usize].to_string();
                    self.sites.push(Specifier {
                        kind: SpecifierKind::StringObject,
                        context,
                        span,
                        value,
                    });
                }
            }
            _ => {}
        }
    }
}

impl VisitAstPath for SpecifierCollector<'_> {
    fn visit_import_decl<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ImportDecl,
        _path: &mut AstNodePath<'r>,
    ) {
        self.record_str(SpecifierContext::Import, &n.src);
    }

    fn visit_named_export<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::NamedExport,
        _path: &mut AstNodePath<'r>,
    ) {
        if let Some(src) = &n.src {
            self.record_str(SpecifierContext::ReExport, src);
        }
    }

    fn visit_export_all<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ExportAll,
        _path: &mut AstNodePath<'r>,
    ) {
        self.record_str(SpecifierContext::ExportAll, &n.src);
    }

    fn visit_ts_import_type<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::TsImportType,
        path: &mut AstNodePath<'r>,
    ) {
        self.record_str(SpecifierContext::TsImportType, &n.arg);
        n.visit_children_with_path(self, path);
    }

    fn visit_call_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::CallExpr,
        path: &mut AstNodePath<'r>,
    ) {
        let context = match &n.callee {
            ast::Callee::Import(_) => Some(SpecifierContext::DynamicImport),
            ast::Callee::Expr(callee) => match &**callee {
                ast::Expr::Ident(ident) if ident.sym.as_ref() == "require" => {
                    Some(SpecifierContext::Require)
                }
                ast::Expr::Member(member) => {
                    let resolve = matches!(
                        &member.prop,
                        ast::MemberProp::Ident(prop) if prop.sym.as_ref() == "resolve"
                    );
                    match (&*member.obj, resolve) {
                        (ast::Expr::Ident(obj), true) if obj.sym.as_ref() == "require" => {
                            Some(SpecifierContext::RequireResolve)
                        }
                        (ast::Expr::MetaProp(meta), true)
                            if meta.kind == ast::MetaPropKind::ImportMeta =>
                        {
                            Some(SpecifierContext::ImportMetaResolve)
                        }
                        _ => None,
                    }
                }
                _ => None,
            },
            ast::Callee::Super(_) => None,
        };

        if let Some(context) = context {
            if let Some(arg) = n.args.first() {
                if arg.spread.is_none() {
                    self.record_expr(context, &arg.expr);
                }
            }
        }

        n.visit_children_with_path(self, path);
    }
}
