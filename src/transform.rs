use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

use indexmap::IndexMap;
use swc_common::Spanned;
use swc_ecma_visit::fields::{AssignExprField, MemberExprField};
use swc_ecma_visit::swc_ecma_ast as ast;
use swc_ecma_visit::{AstNodePath, VisitAstPath, VisitWithPath};

use swc_ecma_visit::AstParentNodeRef as Parent;

use crate::exports::collect_exports_from_module;
use crate::parse::ParseError;
use crate::patch::{PatchBuffer, RangeConflict};
use crate::scope::{
    build_shadow_index, collect_from_module, collect_pat_bindings, IdentifierMeta,
    ResolverOptions, ShadowIndex,
};
use crate::specifier;
use crate::walk::{
    convert_span, is_declaration_binding, is_export_alias, is_label_ident, is_member_prop_ident,
    is_name_slot, is_static_prop_key, structural_parents,
};

/// The module system to lower into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Produce ESM (`import`/`export`/`import.meta`).
    Module,
    /// Produce CommonJS (`require`/`module.exports`).
    CommonJs,
}

/// How named exports are attached when lowering to CommonJS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveBindings {
    /// Every named export becomes a getter-based live binding.
    Strict,
    /// Getters only for mutable bindings (`let`/`var`); plain assignment
    /// otherwise.
    Loose,
    /// Always plain assignment.
    Off,
}

/// What to do with top-level `await` when lowering to CommonJS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopLevelAwait {
    /// Reject the transform.
    Error,
    /// Wrap the body in an async IIFE whose promise is exposed on the module
    /// and re-patches the declared exports on settlement.
    Wrap,
    /// Wrap in a fire-and-forget async IIFE.
    Preserve,
}

/// Interop policy for default exports/imports across the CJS/ESM boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CjsDefault {
    /// The default export is the whole `module.exports` object.
    ModuleExports,
    /// Unwrap an `__esModule` marker via an injected helper; synthesize a
    /// default export only when the source has a whole-object export.
    Auto,
    /// Use the `.default` property directly and never synthesize a default
    /// export from `module.exports`.
    None,
}

/// How `require.main === module` is lowered to ESM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMetaMain {
    /// Emit a runtime shim comparing `process.argv[1]` against
    /// `import.meta.filename`.
    Shim,
    /// Emit `import.meta.main` and warn about the Node.js version it needs.
    Warn,
    /// Reject the transform.
    Error,
}

/// Specifier rewriting applied while transforming.
pub enum SpecifierRewrite {
    /// Swap the extension of relative specifiers to this tag (e.g. `.mjs`).
    Extension(String),
    /// Arbitrary mapping; `None` leaves a specifier untouched.
    Custom(Box<dyn Fn(&str) -> Option<String>>),
}

impl fmt::Debug for SpecifierRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecifierRewrite::Extension(ext) => f.debug_tuple("Extension").field(ext).finish(),
            SpecifierRewrite::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Per-call configuration for [`transform`](crate::transform).
///
/// No state survives across calls; the defaults mirror the conservative
/// behavior of only rewriting bare module-scope globals.
#[derive(Debug)]
pub struct TransformOptions {
    pub target: Target,
    /// Rewrite import/export structure, not just bare globals.
    pub transform_syntax: bool,
    pub live_bindings: LiveBindings,
    pub top_level_await: TopLevelAwait,
    pub cjs_default: CjsDefault,
    pub import_meta_main: ImportMetaMain,
    pub rewrite_specifier: Option<SpecifierRewrite>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            target: Target::CommonJs,
            transform_syntax: false,
            live_bindings: LiveBindings::Loose,
            top_level_await: TopLevelAwait::Error,
            cjs_default: CjsDefault::Auto,
            import_meta_main: ImportMetaMain::Shim,
            rewrite_specifier: None,
        }
    }
}

impl TransformOptions {
    fn rewrite_value(&self, value: &str) -> Option<String> {
        match self.rewrite_specifier.as_ref()? {
            SpecifierRewrite::Extension(ext) => specifier::rewrite_extension(value, ext),
            SpecifierRewrite::Custom(callback) => callback(value),
        }
    }
}

/// A construct the lowering refuses to approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedConstruct {
    WithStatement,
    Eval,
    ShadowedModuleGlobal,
    TopLevelAwait,
    ImportMetaMain,
}

impl fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnsupportedConstruct::WithStatement => "`with` statement",
            UnsupportedConstruct::Eval => "`eval` usage",
            UnsupportedConstruct::ShadowedModuleGlobal => {
                "local declaration shadowing `module`/`exports`"
            }
            UnsupportedConstruct::TopLevelAwait => "top-level `await`",
            UnsupportedConstruct::ImportMetaMain => "`import.meta.main` capability",
        };
        f.write_str(text)
    }
}

/// An Error that can happen while transforming a module.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The parser collaborator rejected the source.
    #[error("failed to parse source: {}", .0.kind().msg())]
    Parse(ParseError),
    /// The source uses a construct the requested lowering refuses to
    /// approximate. No partial output is produced.
    #[error("unsupported construct at offset {offset}: {kind}")]
    Unsupported {
        kind: UnsupportedConstruct,
        offset: u32,
    },
    /// Two rewrite rules claimed overlapping byte ranges. An internal
    /// invariant violation, not recoverable by callers.
    #[error(transparent)]
    RangeConflict(#[from] RangeConflict),
}

impl From<ParseError> for TransformError {
    fn from(err: ParseError) -> Self {
        TransformError::Parse(err)
    }
}

fn unsupported(kind: UnsupportedConstruct, offset: u32) -> TransformError {
    TransformError::Unsupported { kind, offset }
}

/// Fresh names that cannot collide with the module's own bindings.
struct NamePool {
    taken: HashSet<String>,
    counter: usize,
}

impl NamePool {
    fn new(identifiers: &IndexMap<String, IdentifierMeta>) -> Self {
        Self {
            taken: identifiers.keys().cloned().collect(),
            counter: 0,
        }
    }

    /// The next `__modN` temp binding.
    fn temp(&mut self) -> String {
        loop {
            let name = format!("__mod{}", self.counter);
            self.counter += 1;
            if !self.taken.contains(&name) {
                return name;
            }
        }
    }

    /// `base`, or `base1`, `base2`, ... if the name is already in use.
    fn reserve(&mut self, base: &str) -> String {
        let name = if !self.taken.contains(base) {
            base.to_string()
        } else {
            (1..)
                .map(|n| format!("{base}{n}"))
                .find(|name| !self.taken.contains(name))
                .unwrap()
        };
        self.taken.insert(name.clone());
        name
    }
}

fn is_valid_ident_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Renders `s` as a double-quoted JS string literal.
fn js_string(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn member_access(obj: &str, key: &str) -> String {
    if is_valid_ident_name(key) {
        format!("{obj}.{key}")
    } else {
        format!("{obj}[{}]", js_string(key))
    }
}

fn export_name(name: &ast::ModuleExportName) -> String {
    match name {
        ast::ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ast::ModuleExportName::Str(s) => s.value.to_string(),
    }
}

/// The specifier text to re-emit, preserving the original quoting and
/// applying the configured rewrite.
fn spec_text(src: &str, options: &TransformOptions, s: &ast::Str) -> String {
    let span = convert_span(s.span);
    let raw = &src[span.start as usize..span.end as usize];
    match options.rewrite_value(s.value.as_ref()) {
        Some(new) => {
            let quote = raw.chars().next().unwrap_or('\'');
            format!("{quote}{new}{quote}")
        }
        None => raw.to_string(),
    }
}

fn interop_helper(name: &str) -> String {
    format!("function {name}(mod) {{\n  return mod && mod.__esModule ? mod.default : mod;\n}}\n")
}

/// Extends a removed statement's range over its trailing semicolon and line
/// break so no blank line is left behind.
fn stmt_removal_range(src: &str, span: &Range<u32>) -> Range<u32> {
    let bytes = src.as_bytes();
    let mut end = span.end as usize;
    if bytes.get(end) == Some(&b';') {
        end += 1;
    }
    if bytes.get(end) == Some(&b'\r') {
        end += 1;
    }
    if bytes.get(end) == Some(&b'\n') {
        end += 1;
    }
    span.start..end as u32
}

fn claimed_by(claimed: &[Range<u32>], span: &Range<u32>) -> bool {
    claimed
        .iter()
        .any(|r| r.start <= span.start && span.end <= r.end)
}

// --- shared analysis visitors ---------------------------------------------

/// Finds the first `await` that is not nested inside a function or class
/// boundary.
struct TlaFinder {
    found: Option<u32>,
}

impl VisitAstPath for TlaFinder {
    fn visit_await_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::AwaitExpr,
        path: &mut AstNodePath<'r>,
    ) {
        self.found.get_or_insert(n.span.lo.0);
        n.visit_children_with_path(self, path);
    }

    fn visit_for_of_stmt<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ForOfStmt,
        path: &mut AstNodePath<'r>,
    ) {
        if n.is_await {
            self.found.get_or_insert(n.span.lo.0);
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_function<'ast: 'r, 'r>(
        &mut self,
        _n: &'ast ast::Function,
        _path: &mut AstNodePath<'r>,
    ) {
    }

    fn visit_arrow_expr<'ast: 'r, 'r>(
        &mut self,
        _n: &'ast ast::ArrowExpr,
        _path: &mut AstNodePath<'r>,
    ) {
    }

    fn visit_class<'ast: 'r, 'r>(&mut self, _n: &'ast ast::Class, _path: &mut AstNodePath<'r>) {}

    fn visit_getter_prop<'ast: 'r, 'r>(
        &mut self,
        _n: &'ast ast::GetterProp,
        _path: &mut AstNodePath<'r>,
    ) {
    }

    fn visit_setter_prop<'ast: 'r, 'r>(
        &mut self,
        _n: &'ast ast::SetterProp,
        _path: &mut AstNodePath<'r>,
    ) {
    }
}

fn find_top_level_await(module: &ast::Module) -> Option<u32> {
    let mut finder = TlaFinder { found: None };
    module.visit_children_with_path(&mut finder, &mut Default::default());
    finder.found
}

/// Finds `with` statements and (when lowering to ESM) `eval` references.
struct ConstructFinder {
    check_eval: bool,
    found: Option<(UnsupportedConstruct, u32)>,
}

impl VisitAstPath for ConstructFinder {
    fn visit_with_stmt<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::WithStmt,
        path: &mut AstNodePath<'r>,
    ) {
        self.found
            .get_or_insert((UnsupportedConstruct::WithStatement, n.span.lo.0));
        n.visit_children_with_path(self, path);
    }

    fn visit_ident<'ast: 'r, 'r>(&mut self, n: &'ast ast::Ident, path: &mut AstNodePath<'r>) {
        if self.check_eval
            && n.sym.as_ref() == "eval"
            && !is_static_prop_key(path)
            && !is_member_prop_ident(path)
        {
            self.found
                .get_or_insert((UnsupportedConstruct::Eval, n.span.lo.0));
        }
    }
}

fn find_forbidden(module: &ast::Module, check_eval: bool) -> Option<(UnsupportedConstruct, u32)> {
    let mut finder = ConstructFinder {
        check_eval,
        found: None,
    };
    module.visit_children_with_path(&mut finder, &mut Default::default());
    finder.found
}

// --- ESM -> CJS -----------------------------------------------------------

pub(crate) fn esm_to_cjs(
    src: &str,
    module: &ast::Module,
    options: &TransformOptions,
) -> Result<String, TransformError> {
    let (identifiers, tla) = tracing::trace_span!("analyzing module").in_scope(|| {
        if let Some((kind, offset)) = find_forbidden(module, false) {
            return Err(unsupported(kind, offset));
        }
        let identifiers = collect_from_module(
            module,
            &ResolverOptions {
                include_imports: true,
            },
        );
        let tla = find_top_level_await(module);
        if options.transform_syntax
            && matches!(options.top_level_await, TopLevelAwait::Error)
        {
            if let Some(offset) = tla {
                return Err(unsupported(UnsupportedConstruct::TopLevelAwait, offset));
            }
        }
        Ok((identifiers, tla))
    })?;

    let sites = specifier::collect_from_module(module, src);
    let mut names = NamePool::new(&identifiers);
    let interop_name = names.reserve("__interopDefault");
    let tla_name = names.reserve("__tla");
    let vals_name = names.reserve("__vals");

    let mut patch = PatchBuffer::new(src);
    let mut claimed: Vec<Range<u32>> = Vec::new();
    let tla_active = tla.is_some() && !matches!(options.top_level_await, TopLevelAwait::Error);

    let (used_interop, tla_exports) =
        tracing::trace_span!("scanning module").in_scope(|| -> Result<_, TransformError> {
            let has_named = module.body.iter().any(|item| {
                matches!(
                    item,
                    ast::ModuleItem::ModuleDecl(
                        ast::ModuleDecl::ExportDecl(_) | ast::ModuleDecl::ExportNamed(_)
                    )
                )
            });
            let default_to_exports_default = options.transform_syntax
                && (tla_active
                    || match options.cjs_default {
                        CjsDefault::None => true,
                        CjsDefault::Auto => has_named,
                        CjsDefault::ModuleExports => false,
                    });

            let mut used_interop = false;
            let mut tla_exports = Vec::new();
            if options.transform_syntax {
                let mut emitter = CjsEmitter {
                    src,
                    options,
                    patch: &mut patch,
                    names: &mut names,
                    claimed: &mut claimed,
                    interop_name: &interop_name,
                    default_to_exports_default,
                    used_interop: false,
                    tla_exports: Vec::new(),
                };
                for item in &module.body {
                    if let ast::ModuleItem::ModuleDecl(decl) = item {
                        emitter.lower(decl)?;
                    }
                }
                used_interop = emitter.used_interop;
                tla_exports = emitter.tla_exports;
            }

            // Bare-global rewrites apply regardless of transform_syntax.
            let deferred = {
                let mut meta = MetaRewriter {
                    patch: &mut patch,
                    deferred: Vec::new(),
                    err: None,
                };
                module.visit_children_with_path(&mut meta, &mut Default::default());
                if let Some(err) = meta.err {
                    return Err(err.into());
                }
                meta.deferred
            };
            for range in deferred {
                // An assignment to an import.meta member has no CJS
                // equivalent; quote its rewritten form in a comment.
                patch.absorb(range, |stmt| format!("/* {stmt} */"))?;
            }

            for site in &sites {
                if claimed_by(&claimed, &site.span) {
                    continue;
                }
                if let Some(text) = options.rewrite_value(&site.value) {
                    specifier::apply(site, &text, &mut patch)?;
                }
            }

            Ok((used_interop, tla_exports))
        })?;

    let out = tracing::trace_span!("applying edits").in_scope(|| {
        if used_interop {
            patch.prepend(interop_helper(&interop_name));
        }
        if options.transform_syntax && tla_active {
            match options.top_level_await {
                TopLevelAwait::Wrap => {
                    patch.prepend(format!("const {tla_name} = (async () => {{\n"));
                    if tla_exports.is_empty()
                        || matches!(options.live_bindings, LiveBindings::Strict)
                    {
                        // Getter-based exports stay live on their own; only
                        // the promise needs exposing.
                        patch.append(format!(
                            "\n}})();\nmodule.exports.{tla_name} = {tla_name};"
                        ));
                    } else {
                        let entries = tla_exports
                            .iter()
                            .map(|(exported, local)| {
                                format!("{}: {local}", js_string(exported))
                            })
                            .collect::<Vec<_>>()
                            .join(", ");
                        patch.append(format!(
                            "\nreturn {{ {entries} }};\n}})();\nmodule.exports.{tla_name} = {tla_name}.then(({vals_name}) => {{\n  Object.assign(module.exports, {vals_name});\n}});"
                        ));
                    }
                }
                TopLevelAwait::Preserve => {
                    patch.prepend("(async () => {\n");
                    patch.append("\n})();");
                }
                TopLevelAwait::Error => {}
            }
        }
        patch.render()
    });
    Ok(out)
}

/// Emits the CommonJS replacement for one ESM module declaration.
struct CjsEmitter<'s, 'a> {
    src: &'a str,
    options: &'s TransformOptions,
    patch: &'s mut PatchBuffer<'a>,
    names: &'s mut NamePool,
    claimed: &'s mut Vec<Range<u32>>,
    interop_name: &'s str,
    default_to_exports_default: bool,
    used_interop: bool,
    /// (exported name, local identifier) pairs for the top-level-await
    /// re-patch on settlement.
    tla_exports: Vec<(String, String)>,
}

impl CjsEmitter<'_, '_> {
    fn lower(&mut self, decl: &ast::ModuleDecl) -> Result<(), TransformError> {
        match decl {
            ast::ModuleDecl::Import(import) => self.import_decl(import),
            ast::ModuleDecl::ExportDecl(export) => self.export_decl(export),
            ast::ModuleDecl::ExportNamed(export) => self.named_export(export),
            ast::ModuleDecl::ExportDefaultDecl(export) => self.export_default_decl(export),
            ast::ModuleDecl::ExportDefaultExpr(export) => self.export_default_expr(export),
            ast::ModuleDecl::ExportAll(export) => self.export_all(export),
            // TS-only module forms have no runtime lowering here.
            _ => Ok(()),
        }
    }

    fn replace_item(
        &mut self,
        span: Range<u32>,
        lines: Vec<String>,
    ) -> Result<(), TransformError> {
        self.patch.replace(span.clone(), lines.join("\n"))?;
        self.claimed.push(span);
        Ok(())
    }

    fn default_binding(&mut self, temp: &str) -> String {
        match self.options.cjs_default {
            CjsDefault::ModuleExports => temp.to_string(),
            CjsDefault::None => format!("{temp}.default"),
            CjsDefault::Auto => {
                self.used_interop = true;
                format!("{}({temp})", self.interop_name)
            }
        }
    }

    fn default_export_line(&self, value: &str) -> String {
        if self.default_to_exports_default {
            format!("exports.default = {value};")
        } else {
            format!("module.exports = {value};")
        }
    }

    fn export_assign(&self, key: &str, value: &str, mutable: bool) -> String {
        let getter = match self.options.live_bindings {
            LiveBindings::Strict => true,
            LiveBindings::Loose => mutable,
            LiveBindings::Off => false,
        };
        if getter {
            format!(
                "Object.defineProperty(exports, {}, {{ enumerable: true, get: () => {value} }});",
                js_string(key)
            )
        } else if is_valid_ident_name(key) {
            format!("exports.{key} = {value};")
        } else {
            format!("exports[{}] = {value};", js_string(key))
        }
    }

    fn import_decl(&mut self, import: &ast::ImportDecl) -> Result<(), TransformError> {
        if import.type_only {
            return Ok(());
        }
        let span = convert_span(import.span);
        let spec = spec_text(self.src, self.options, &import.src);

        if import.specifiers.is_empty() {
            return self.replace_item(span, vec![format!("require({spec});")]);
        }

        let temp = self.names.temp();
        let mut lines = vec![format!("const {temp} = require({spec});")];
        let mut named = Vec::new();
        for spec_item in &import.specifiers {
            match spec_item {
                ast::ImportSpecifier::Named(n) => {
                    let local = n.local.sym.as_ref();
                    match &n.imported {
                        Some(ast::ModuleExportName::Ident(imported))
                            if imported.sym != n.local.sym =>
                        {
                            named.push(format!("{}: {local}", imported.sym));
                        }
                        Some(ast::ModuleExportName::Str(imported)) => {
                            named.push(format!("{}: {local}", js_string(imported.value.as_ref())));
                        }
                        _ => named.push(local.to_string()),
                    }
                }
                ast::ImportSpecifier::Default(n) => {
                    let binding = self.default_binding(&temp);
                    lines.push(format!("const {} = {binding};", n.local.sym));
                }
                ast::ImportSpecifier::Namespace(n) => {
                    lines.push(format!("const {} = {temp};", n.local.sym));
                }
            }
        }
        if !named.is_empty() {
            lines.insert(1, format!("const {{ {} }} = {temp};", named.join(", ")));
        }
        self.replace_item(span, lines)
    }

    fn export_decl(&mut self, export: &ast::ExportDecl) -> Result<(), TransformError> {
        let item_span = convert_span(export.span);
        let decl_span = convert_span(export.decl.span());

        let mut bindings: Vec<(String, bool)> = Vec::new();
        match &export.decl {
            ast::Decl::Var(var) => {
                let mutable = !matches!(var.kind, ast::VarDeclKind::Const);
                let mut names = Vec::new();
                for decl in &var.decls {
                    collect_pat_bindings(&decl.name, &mut names);
                }
                bindings.extend(names.into_iter().map(|(name, _)| (name, mutable)));
            }
            ast::Decl::Fn(f) => bindings.push((f.ident.sym.to_string(), false)),
            ast::Decl::Class(c) => bindings.push((c.ident.sym.to_string(), false)),
            // `export interface` etc. carry no runtime binding.
            _ => return Ok(()),
        }

        self.patch.replace(item_span.start..decl_span.start, "")?;
        let mut lines = Vec::new();
        for (name, mutable) in &bindings {
            lines.push(self.export_assign(name, name, *mutable));
            self.tla_exports.push((name.clone(), name.clone()));
        }
        self.patch
            .insert(item_span.end, format!("\n{}", lines.join("\n")))?;
        Ok(())
    }

    fn named_export(&mut self, export: &ast::NamedExport) -> Result<(), TransformError> {
        if export.type_only {
            return Ok(());
        }
        let item_span = convert_span(export.span);
        let mut lines = Vec::new();

        if let Some(src_lit) = &export.src {
            let spec = spec_text(self.src, self.options, src_lit);
            let temp = self.names.temp();
            lines.push(format!("const {temp} = require({spec});"));
            for spec_item in &export.specifiers {
                match spec_item {
                    ast::ExportSpecifier::Named(named) => {
                        let orig = export_name(&named.orig);
                        let exported = named
                            .exported
                            .as_ref()
                            .map(export_name)
                            .unwrap_or_else(|| orig.clone());
                        let value = if orig == "default" {
                            self.default_binding(&temp)
                        } else {
                            member_access(&temp, &orig)
                        };
                        if exported == "default" {
                            lines.push(self.default_export_line(&value));
                        } else {
                            lines.push(self.export_assign(&exported, &value, false));
                        }
                    }
                    ast::ExportSpecifier::Namespace(ns) => {
                        let exported = export_name(&ns.name);
                        lines.push(self.export_assign(&exported, &temp, false));
                    }
                    ast::ExportSpecifier::Default(default) => {
                        let value = self.default_binding(&temp);
                        lines.push(self.export_assign(default.exported.sym.as_ref(), &value, false));
                    }
                }
            }
            self.replace_item(item_span, lines)
        } else {
            for spec_item in &export.specifiers {
                if let ast::ExportSpecifier::Named(named) = spec_item {
                    let orig = export_name(&named.orig);
                    let exported = named
                        .exported
                        .as_ref()
                        .map(export_name)
                        .unwrap_or_else(|| orig.clone());
                    if exported == "default" {
                        lines.push(self.default_export_line(&orig));
                    } else {
                        lines.push(self.export_assign(&exported, &orig, false));
                        self.tla_exports.push((exported, orig));
                    }
                }
            }
            self.patch.replace(item_span, lines.join("\n"))?;
            Ok(())
        }
    }

    /// Byte offset just past `export default` and its trailing whitespace.
    fn default_prefix_end(&self, item_span: &Range<u32>) -> u32 {
        let text = &self.src[item_span.start as usize..item_span.end as usize];
        let after = text.find("default").map(|i| i + "default".len()).unwrap_or(0);
        let ws = text[after..].len() - text[after..].trim_start().len();
        item_span.start + (after + ws) as u32
    }

    fn export_default_decl(
        &mut self,
        export: &ast::ExportDefaultDecl,
    ) -> Result<(), TransformError> {
        let item_span = convert_span(export.span);
        let prefix = item_span.start..self.default_prefix_end(&item_span);
        let ident = match &export.decl {
            ast::DefaultDecl::Fn(f) => f.ident.as_ref(),
            ast::DefaultDecl::Class(c) => c.ident.as_ref(),
            ast::DefaultDecl::TsInterfaceDecl(_) => return Ok(()),
        };
        match ident {
            Some(ident) => {
                // Named form: keep the declaration, export the binding.
                self.patch.replace(prefix, "")?;
                let line = self.default_export_line(ident.sym.as_ref());
                self.patch.insert(item_span.end, format!("\n{line}"))?;
            }
            None => {
                let target = if self.default_to_exports_default {
                    "exports.default"
                } else {
                    "module.exports"
                };
                self.patch.replace(prefix, format!("{target} = "))?;
            }
        }
        Ok(())
    }

    fn export_default_expr(
        &mut self,
        export: &ast::ExportDefaultExpr,
    ) -> Result<(), TransformError> {
        let item_span = convert_span(export.span);
        let prefix = item_span.start..self.default_prefix_end(&item_span);
        let target = if self.default_to_exports_default {
            "exports.default"
        } else {
            "module.exports"
        };
        self.patch.replace(prefix, format!("{target} = "))?;
        Ok(())
    }

    fn export_all(&mut self, export: &ast::ExportAll) -> Result<(), TransformError> {
        let item_span = convert_span(export.span);
        let spec = spec_text(self.src, self.options, &export.src);
        let temp = self.names.temp();
        let key = self.names.reserve("__key");
        let lines = vec![
            format!("const {temp} = require({spec});"),
            format!("for (const {key} of Object.keys({temp})) {{"),
            format!(
                "  if ({key} === \"default\" || Object.prototype.hasOwnProperty.call(exports, {key})) continue;"
            ),
            format!(
                "  Object.defineProperty(exports, {key}, {{ enumerable: true, get: () => {temp}[{key}] }});"
            ),
            "}".to_string(),
        ];
        self.replace_item(item_span, lines)
    }
}

/// Rewrites `import.meta` members to their CommonJS equivalents.
struct MetaRewriter<'s, 'a> {
    patch: &'s mut PatchBuffer<'a>,
    /// Statements assigning to an `import.meta` member, commented out after
    /// their pieces were rewritten.
    deferred: Vec<Range<u32>>,
    err: Option<RangeConflict>,
}

impl MetaRewriter<'_, '_> {
    fn put(&mut self, range: Range<u32>, text: &str) {
        if self.err.is_none() {
            if let Err(err) = self.patch.replace(range, text) {
                self.err = Some(err);
            }
        }
    }
}

fn is_import_meta(expr: &ast::Expr) -> bool {
    matches!(
        expr,
        ast::Expr::MetaProp(meta) if meta.kind == ast::MetaPropKind::ImportMeta
    )
}

fn is_import_meta_member(expr: &ast::Expr) -> bool {
    matches!(expr, ast::Expr::Member(member) if is_import_meta(&member.obj))
}

impl VisitAstPath for MetaRewriter<'_, '_> {
    fn visit_expr_stmt<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ExprStmt,
        path: &mut AstNodePath<'r>,
    ) {
        if let ast::Expr::Assign(assign) = &*n.expr {
            let meta_target = match &assign.left {
                ast::PatOrExpr::Expr(left) => is_import_meta_member(left),
                ast::PatOrExpr::Pat(left) => match &**left {
                    ast::Pat::Expr(left) => is_import_meta_member(left),
                    _ => false,
                },
            };
            if meta_target {
                self.deferred.push(convert_span(n.span));
            }
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_member_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::MemberExpr,
        path: &mut AstNodePath<'r>,
    ) {
        if is_import_meta(&n.obj) {
            let span = convert_span(n.span);
            if let ast::MemberProp::Ident(prop) = &n.prop {
                match prop.sym.as_ref() {
                    "url" => self.put(
                        span,
                        "require(\"node:url\").pathToFileURL(__filename).toString()",
                    ),
                    "filename" => self.put(span, "__filename"),
                    "dirname" => self.put(span, "__dirname"),
                    "resolve" => self.put(span, "require.resolve"),
                    "main" => self.put(span, "(require.main === module)"),
                    _ => {}
                }
            }
            // Unknown meta members stay untouched rather than guessed.
            return;
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_meta_prop_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::MetaPropExpr,
        _path: &mut AstNodePath<'r>,
    ) {
        if n.kind == ast::MetaPropKind::ImportMeta {
            self.put(convert_span(n.span), "require.main");
        }
    }
}

// --- CJS -> ESM -----------------------------------------------------------

pub(crate) fn cjs_to_esm(
    src: &str,
    module: &ast::Module,
    options: &TransformOptions,
) -> Result<String, TransformError> {
    let (identifiers, table) = tracing::trace_span!("analyzing module").in_scope(|| {
        if let Some((kind, offset)) = find_forbidden(module, true) {
            return Err(unsupported(kind, offset));
        }
        let identifiers = collect_from_module(
            module,
            &ResolverOptions {
                include_imports: true,
            },
        );
        if options.transform_syntax {
            for name in ["module", "exports"] {
                if let Some(decl) = identifiers
                    .get(name)
                    .and_then(|meta| meta.declarations.first())
                {
                    return Err(unsupported(
                        UnsupportedConstruct::ShadowedModuleGlobal,
                        decl.start,
                    ));
                }
            }
        }
        let table = if options.transform_syntax {
            collect_exports_from_module(module)
        } else {
            IndexMap::new()
        };
        Ok((identifiers, table))
    })?;

    let shadows = build_shadow_index(
        module,
        &["exports", "module", "require", "__filename", "__dirname"],
    );
    let require_disabled = identifiers
        .get("require")
        .is_some_and(|meta| !meta.declarations.is_empty());
    let sites = specifier::collect_from_module(module, src);
    let mut names = NamePool::new(&identifiers);
    let surrogate = names.reserve("__exports");

    let mut patch = PatchBuffer::new(src);
    let mut claimed: Vec<Range<u32>> = Vec::new();

    // Hoisting plan: statically hoistable top-level requires become imports.
    let mut imports: Vec<String> = Vec::new();
    let mut call_aliases: HashMap<u32, String> = HashMap::new();
    let mut skip_stmts: Vec<Range<u32>> = Vec::new();

    if options.transform_syntax && !require_disabled {
        for item in &module.body {
            let stmt = match item {
                ast::ModuleItem::Stmt(stmt) => stmt,
                _ => continue,
            };
            match stmt {
                ast::Stmt::Decl(ast::Decl::Var(var)) if var.decls.len() == 1 => {
                    let decl = &var.decls[0];
                    let init = match &decl.init {
                        Some(init) => init,
                        None => continue,
                    };
                    let (call, src_lit) = match as_require_call(init, &shadows) {
                        Some(found) => found,
                        None => continue,
                    };
                    let spec = spec_text(src, options, src_lit);
                    match &decl.name {
                        ast::Pat::Ident(binding)
                            if matches!(var.kind, ast::VarDeclKind::Const) =>
                        {
                            imports.push(format!("import {} from {spec};\n", binding.id.sym));
                            skip_stmts.push(stmt_removal_range(src, &convert_span(var.span)));
                        }
                        ast::Pat::Ident(_) => {
                            // let/var bindings stay reassignable, so keep the
                            // declaration and alias the import temp.
                            let temp = names.temp();
                            imports.push(format!("import {temp} from {spec};\n"));
                            call_aliases.insert(call.span.lo.0, temp);
                            claimed.push(convert_span(call.span));
                        }
                        ast::Pat::Object(obj) if hoistable_obj_pat(obj) => {
                            let temp = names.temp();
                            imports.push(format!("import * as {temp} from {spec};\n"));
                            call_aliases.insert(call.span.lo.0, temp);
                            claimed.push(convert_span(call.span));
                        }
                        _ => {
                            tracing::debug!(
                                "require binding at offset {} is not hoistable",
                                var.span.lo.0
                            );
                        }
                    }
                }
                ast::Stmt::Expr(expr_stmt) => {
                    if let Some((_, src_lit)) = as_require_call(&expr_stmt.expr, &shadows) {
                        let spec = spec_text(src, options, src_lit);
                        imports.push(format!("import {spec};\n"));
                        skip_stmts.push(stmt_removal_range(src, &convert_span(expr_stmt.span)));
                    }
                }
                _ => {}
            }
        }
    }

    for range in &skip_stmts {
        patch.remove(range.clone())?;
        claimed.push(range.clone());
    }

    // Whole-object export rewritten in place to `export default` only when
    // it is the module's sole, unconditional export.
    let default_inplace: Option<Range<u32>> = if options.transform_syntax
        && !matches!(options.cjs_default, CjsDefault::None)
        && table.len() == 1
    {
        table.get("default").and_then(|entry| {
            if entry.writes.len() != 1 || !entry.via.module_exports {
                return None;
            }
            let write = &entry.writes[0];
            match (&write.stmt, &write.value) {
                (Some(stmt), Some(value)) => Some(stmt.start..value.start),
                _ => None,
            }
        })
    } else {
        None
    };
    if let Some(prefix) = &default_inplace {
        patch.replace(prefix.clone(), "export default ")?;
    }

    let scan = tracing::trace_span!("scanning module").in_scope(
        || -> Result<(bool, bool), TransformError> {
            let mut scanner = CjsScanner {
                options,
                shadows: &shadows,
                patch: &mut patch,
                call_aliases: &call_aliases,
                skip_ranges: &skip_stmts,
                suppress: default_inplace.clone(),
                surrogate: &surrogate,
                require_disabled,
                exports_used: false,
                needs_create_require: false,
                pending: None,
                err: None,
            };
            module.visit_children_with_path(&mut scanner, &mut Default::default());
            if let Some(err) = scanner.err {
                return Err(err.into());
            }
            if let Some((kind, offset)) = scanner.pending {
                return Err(unsupported(kind, offset));
            }
            Ok((scanner.exports_used, scanner.needs_create_require))
        },
    )?;
    let (exports_used, needs_create_require) = scan;

    tracing::trace_span!("applying edits").in_scope(|| -> Result<(), TransformError> {
        for line in &imports {
            patch.prepend(line.clone());
        }
        if needs_create_require {
            patch.prepend("import { createRequire } from 'node:module';\n");
            patch.prepend("const require = createRequire(import.meta.url);\n");
        }
        if exports_used {
            patch.prepend(format!("let {surrogate} = {{}};\n"));
        }

        if options.transform_syntax {
            let mut lines: Vec<String> = Vec::new();
            for (key, entry) in &table {
                if key == "default" {
                    continue;
                }
                let direct = entry.from_identifier.as_deref().filter(|local| {
                    identifiers
                        .get(*local)
                        .is_some_and(|meta| !meta.declarations.is_empty())
                });
                match direct {
                    Some(local) if local == key => lines.push(format!("export {{ {local} }};")),
                    Some(local) if is_valid_ident_name(key) => {
                        lines.push(format!("export {{ {local} as {key} }};"));
                    }
                    Some(local) => {
                        lines.push(format!("export {{ {local} as {} }};", js_string(key)));
                    }
                    None => {
                        // ESM named exports must bind an identifier, so
                        // materialize a temp bound to the surrogate.
                        let temp = names.reserve(&format!("__export_{}", sanitize_key(key)));
                        let exported = if is_valid_ident_name(key) {
                            key.clone()
                        } else {
                            js_string(key)
                        };
                        lines.push(format!(
                            "const {temp} = {};\nexport {{ {temp} as {exported} }};",
                            member_access(&surrogate, key)
                        ));
                    }
                }
            }

            let emit_default = match options.cjs_default {
                CjsDefault::ModuleExports => exports_used,
                CjsDefault::Auto => {
                    table.get("default").is_some_and(|e| e.via.module_exports) && exports_used
                }
                CjsDefault::None => false,
            };
            if emit_default && default_inplace.is_none() {
                lines.push(format!("export default {surrogate};"));
            }

            if !lines.is_empty() {
                patch.append(format!("\n{}\n", lines.join("\n")));
            }
        }

        for site in &sites {
            if claimed_by(&claimed, &site.span) {
                continue;
            }
            if let Some(text) = options.rewrite_value(&site.value) {
                specifier::apply(site, &text, &mut patch)?;
            }
        }
        Ok(())
    })?;

    Ok(patch.render())
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn as_require_call<'e>(
    expr: &'e ast::Expr,
    shadows: &ShadowIndex,
) -> Option<(&'e ast::CallExpr, &'e ast::Str)> {
    let call = match expr {
        ast::Expr::Call(call) => call,
        _ => return None,
    };
    let callee = match &call.callee {
        ast::Callee::Expr(callee) => &**callee,
        _ => return None,
    };
    match callee {
        ast::Expr::Ident(ident)
            if ident.sym.as_ref() == "require"
                && !shadows.is_shadowed("require", ident.span.lo.0) => {}
        _ => return None,
    }
    if call.args.len() != 1 || call.args[0].spread.is_some() {
        return None;
    }
    match &*call.args[0].expr {
        ast::Expr::Lit(ast::Lit::Str(s)) => Some((call, s)),
        _ => None,
    }
}

fn hoistable_obj_pat(obj: &ast::ObjectPat) -> bool {
    obj.props.iter().all(|prop| match prop {
        ast::ObjectPatProp::KeyValue(kv) => {
            !matches!(kv.key, ast::PropName::Computed(_)) && hoistable_value_pat(&kv.value)
        }
        ast::ObjectPatProp::Assign(_) => true,
        // Rest properties would need the whole namespace object.
        ast::ObjectPatProp::Rest(_) => false,
    })
}

fn hoistable_value_pat(pat: &ast::Pat) -> bool {
    match pat {
        ast::Pat::Ident(_) => true,
        ast::Pat::Object(obj) => hoistable_obj_pat(obj),
        ast::Pat::Assign(assign) => hoistable_value_pat(&assign.left),
        _ => false,
    }
}

/// The single scanning walk of the CJS -> ESM direction: rewrites globals,
/// redirects the exports surface, and applies the hoisting plan.
struct CjsScanner<'s, 'a> {
    options: &'s TransformOptions,
    shadows: &'s ShadowIndex,
    patch: &'s mut PatchBuffer<'a>,
    call_aliases: &'s HashMap<u32, String>,
    skip_ranges: &'s [Range<u32>],
    /// Range of the in-place `export default` prefix; the member inside it
    /// is already rewritten.
    suppress: Option<Range<u32>>,
    surrogate: &'s str,
    require_disabled: bool,
    exports_used: bool,
    needs_create_require: bool,
    pending: Option<(UnsupportedConstruct, u32)>,
    err: Option<RangeConflict>,
}

impl CjsScanner<'_, '_> {
    fn put(&mut self, range: Range<u32>, text: &str) {
        if self.err.is_none() {
            if let Err(err) = self.patch.replace(range, text) {
                self.err = Some(err);
            }
        }
    }

    fn global(&self, ident: &ast::Ident, name: &str) -> bool {
        ident.sym.as_ref() == name && !self.shadows.is_shadowed(name, ident.span.lo.0)
    }

    fn is_module_exports(&self, n: &ast::MemberExpr) -> bool {
        matches!(&*n.obj, ast::Expr::Ident(obj) if self.global(obj, "module"))
            && matches!(&n.prop, ast::MemberProp::Ident(prop) if prop.sym.as_ref() == "exports")
    }

    fn is_require_main(&self, expr: &ast::Expr) -> bool {
        match expr {
            ast::Expr::Member(member) => {
                matches!(&*member.obj, ast::Expr::Ident(obj) if self.global(obj, "require"))
                    && matches!(&member.prop, ast::MemberProp::Ident(prop) if prop.sym.as_ref() == "main")
            }
            _ => false,
        }
    }

    fn is_module_ident(&self, expr: &ast::Expr) -> bool {
        matches!(expr, ast::Expr::Ident(ident) if self.global(ident, "module"))
    }
}

impl VisitAstPath for CjsScanner<'_, '_> {
    fn visit_stmt<'ast: 'r, 'r>(&mut self, n: &'ast ast::Stmt, path: &mut AstNodePath<'r>) {
        let span = convert_span(n.span());
        if self
            .skip_ranges
            .iter()
            .any(|r| r.start <= span.start && span.end <= r.end)
        {
            return;
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_bin_expr<'ast: 'r, 'r>(&mut self, n: &'ast ast::BinExpr, path: &mut AstNodePath<'r>) {
        if n.op == ast::BinaryOp::EqEqEq {
            let matched = (self.is_require_main(&n.left) && self.is_module_ident(&n.right))
                || (self.is_module_ident(&n.left) && self.is_require_main(&n.right));
            if matched {
                let span = convert_span(n.span);
                match self.options.import_meta_main {
                    ImportMetaMain::Shim => {
                        self.put(span, "(process.argv[1] === import.meta.filename)");
                    }
                    ImportMetaMain::Warn => {
                        tracing::warn!(
                            "emitting `import.meta.main`, which requires a recent Node.js"
                        );
                        self.put(span, "import.meta.main");
                    }
                    ImportMetaMain::Error => {
                        self.pending
                            .get_or_insert((UnsupportedConstruct::ImportMetaMain, span.start));
                    }
                }
                return;
            }
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_member_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::MemberExpr,
        path: &mut AstNodePath<'r>,
    ) {
        let span = convert_span(n.span);
        if let Some(suppress) = &self.suppress {
            if suppress.start <= span.start && span.end <= suppress.end {
                return;
            }
        }

        if self.is_module_exports(n) {
            if self.options.transform_syntax {
                self.exports_used = true;
                let surrogate = self.surrogate.to_string();
                self.put(span, &surrogate);
            } else if matches!(structural_parents(path).next(), Some(Parent::ExprStmt(..))) {
                // A standalone `module.exports` reference would throw in ESM.
                self.put(span, "{}");
            }
            return;
        }

        if let ast::Expr::Ident(obj) = &*n.obj {
            if self.global(obj, "require") {
                if let ast::MemberProp::Ident(prop) = &n.prop {
                    match prop.sym.as_ref() {
                        "resolve" => {
                            self.put(span, "import.meta.resolve");
                            return;
                        }
                        "cache" => {
                            self.put(span, "{}");
                            return;
                        }
                        "main" => {
                            self.put(span, "import.meta");
                            return;
                        }
                        _ => {}
                    }
                }
            }
        }

        n.visit_children_with_path(self, path);
    }

    fn visit_call_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::CallExpr,
        path: &mut AstNodePath<'r>,
    ) {
        if let ast::Callee::Expr(callee) = &n.callee {
            if let ast::Expr::Ident(ident) = &**callee {
                if self.global(ident, "require") {
                    if let Some(temp) = self.call_aliases.get(&n.span.lo.0) {
                        let temp = temp.clone();
                        self.put(convert_span(n.span), &temp);
                        return;
                    }
                }
            }
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_ident<'ast: 'r, 'r>(&mut self, n: &'ast ast::Ident, path: &mut AstNodePath<'r>) {
        if is_static_prop_key(path)
            || is_member_prop_ident(path)
            || is_label_ident(path)
            || is_export_alias(path)
            || is_name_slot(path)
            || is_declaration_binding(path)
        {
            return;
        }
        let span = convert_span(n.span);
        match n.sym.as_ref() {
            "__filename" if self.global(n, "__filename") => {
                self.put(span, "import.meta.filename");
            }
            "__dirname" if self.global(n, "__dirname") => {
                self.put(span, "import.meta.dirname");
            }
            "exports" if self.global(n, "exports") => {
                if self.options.transform_syntax {
                    self.exports_used = true;
                    let surrogate = self.surrogate.to_string();
                    self.put(span, &surrogate);
                } else {
                    // Globals-only mode never touches member bases or write
                    // targets; a bare read becomes an empty object, matching
                    // what a CJS-less runtime would give it.
                    let skip = matches!(
                        structural_parents(path).next(),
                        Some(
                            Parent::MemberExpr(_, MemberExprField::Obj)
                                | Parent::AssignExpr(_, AssignExprField::Left)
                                | Parent::BindingIdent(..)
                        )
                    );
                    if !skip {
                        self.put(span, "{}");
                    }
                }
            }
            "module" if self.global(n, "module") => {
                let member_base = matches!(
                    structural_parents(path).next(),
                    Some(Parent::MemberExpr(_, MemberExprField::Obj))
                );
                if !member_base {
                    self.put(span, "import.meta");
                }
            }
            "require"
                if self.options.transform_syntax
                    && !self.require_disabled
                    && self.global(n, "require") =>
            {
                self.needs_create_require = true;
            }
            _ => {}
        }
    }

    fn visit_import_decl<'ast: 'r, 'r>(
        &mut self,
        _n: &'ast ast::ImportDecl,
        _path: &mut AstNodePath<'r>,
    ) {
        // Already-ESM imports in mixed sources stay as they are.
    }

    fn visit_ts_type<'ast: 'r, 'r>(&mut self, _n: &'ast ast::TsType, _path: &mut AstNodePath<'r>) {}
}
