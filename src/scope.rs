use std::collections::HashSet;
use std::ops::Range;

use indexmap::IndexMap;
use swc_ecma_visit::swc_ecma_ast as ast;
use swc_ecma_visit::{AstNodePath, VisitAstPath, VisitWithPath};

use crate::walk::{
    convert_span, is_export_alias, is_label_ident, is_member_prop_ident, is_static_prop_key,
    structural_parents,
};
use crate::{Dialect, TransformError};

use swc_ecma_visit::AstParentNodeRef as Parent;

/// Module-scope metadata for a single identifier name.
///
/// `declarations` holds the spans of the name's declaration group (repeated
/// `var` redeclarations collapse into the first entry). `reads` holds the
/// spans of every reference that resolves to that declaration, including
/// references hoisted from earlier in the source for `var`/function bindings.
///
/// A name with no declarations never records reads.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMeta {
    pub declarations: Vec<Range<u32>>,
    pub reads: Vec<Range<u32>>,
}

/// Options for [`collect_module_identifiers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    /// Treat import bindings as module-scope declarations.
    ///
    /// Off by default; enabled when the caller needs to detect shadowing of
    /// reserved CommonJS globals by imported names.
    pub include_imports: bool,
}

/// Collects the module-scope identifier declarations of `src` and every read
/// that resolves to them.
///
/// The returned map preserves declaration order. See [`IdentifierMeta`] for
/// the recorded data.
///
/// # Examples
///
/// ```
/// use js_module_syntax::{collect_module_identifiers, Dialect, ResolverOptions};
///
/// let src = "const a = 1; function f() { return a; }";
/// let idents =
///     collect_module_identifiers(src, Dialect::Js, &ResolverOptions::default()).unwrap();
///
/// assert_eq!(idents["a"].reads.len(), 1);
/// assert_eq!(idents["f"].reads.len(), 0);
/// ```
pub fn collect_module_identifiers(
    src: &str,
    dialect: Dialect,
    options: &ResolverOptions,
) -> Result<IndexMap<String, IdentifierMeta>, TransformError> {
    let module = crate::parse::parse_module(src, dialect)?;
    Ok(collect_from_module(&module, options))
}

pub(crate) fn collect_from_module(
    module: &ast::Module,
    options: &ResolverOptions,
) -> IndexMap<String, IdentifierMeta> {
    tracing::trace_span!("resolving identifiers").in_scope(|| {
        let mut collector = IdentifierCollector {
            include_imports: options.include_imports,
            scopes: ScopeStack::default(),
            identifiers: IndexMap::new(),
            pending_reads: IndexMap::new(),
            pending_self_name: None,
            pending_catch_params: Vec::new(),
        };

        module.visit_children_with_path(&mut collector, &mut Default::default());

        collector.identifiers
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Function,
    Class,
    Block,
}

#[derive(Debug)]
struct Frame {
    kind: ScopeKind,
    bound: HashSet<String>,
}

/// The stack of scopes between the current traversal position and module
/// scope. Module scope itself is represented by an empty stack.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub(crate) fn enter(&mut self, kind: ScopeKind) {
        self.frames.push(Frame {
            kind,
            bound: HashSet::new(),
        });
    }

    pub(crate) fn exit(&mut self) {
        self.frames.pop();
    }

    /// Binds a name in the innermost scope. A no-op at module scope, where
    /// bindings are tracked by the identifier registry instead.
    pub(crate) fn bind(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bound.insert(name.to_string());
        }
    }

    /// Whether any enclosing scope shadows `name`.
    pub(crate) fn is_bound(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.bound.contains(name))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn only_blocks(&self) -> bool {
        self.frames.iter().all(|f| f.kind == ScopeKind::Block)
    }
}

/// Collects the bound names (with spans) that a binding pattern introduces,
/// in source order. Value-position expressions are not touched.
pub(crate) fn collect_pat_bindings(pat: &ast::Pat, names: &mut Vec<(String, Range<u32>)>) {
    match pat {
        ast::Pat::Ident(ident) => {
            names.push((ident.id.sym.to_string(), convert_span(ident.id.span)));
        }
        ast::Pat::Array(arr) => {
            for elem in arr.elems.iter().flatten() {
                collect_pat_bindings(elem, names);
            }
        }
        ast::Pat::Rest(rest) => collect_pat_bindings(&rest.arg, names),
        ast::Pat::Object(obj) => {
            for prop in &obj.props {
                match prop {
                    ast::ObjectPatProp::KeyValue(kv) => collect_pat_bindings(&kv.value, names),
                    ast::ObjectPatProp::Assign(assign) => {
                        names.push((
                            assign.key.sym.to_string(),
                            convert_span(assign.key.span),
                        ));
                    }
                    ast::ObjectPatProp::Rest(rest) => collect_pat_bindings(&rest.arg, names),
                }
            }
        }
        ast::Pat::Assign(assign) => collect_pat_bindings(&assign.left, names),
        ast::Pat::Expr(_) | ast::Pat::Invalid(_) => {}
    }
}

/// Byte ranges in which a watched name is shadowed by a local binding.
///
/// Built once per pass for the handful of names a transform cares about
/// (`exports`, `module`, `require`, ...), so downstream visitors can answer
/// "is this occurrence the CommonJS global?" with a span lookup instead of
/// carrying their own scope stack.
#[derive(Debug, Default)]
pub(crate) struct ShadowIndex {
    ranges: IndexMap<String, Vec<Range<u32>>>,
}

impl ShadowIndex {
    pub(crate) fn is_shadowed(&self, name: &str, offset: u32) -> bool {
        self.ranges
            .get(name)
            .is_some_and(|ranges| ranges.iter().any(|r| r.start <= offset && offset < r.end))
    }
}

pub(crate) fn build_shadow_index(module: &ast::Module, names: &[&str]) -> ShadowIndex {
    let mut collector = ShadowCollector {
        names,
        frames: Vec::new(),
        index: ShadowIndex::default(),
    };
    module.visit_children_with_path(&mut collector, &mut Default::default());
    collector.index
}

struct ShadowFrame {
    kind: ScopeKind,
    span: Range<u32>,
}

struct ShadowCollector<'a> {
    names: &'a [&'a str],
    frames: Vec<ShadowFrame>,
    index: ShadowIndex,
}

impl ShadowCollector<'_> {
    /// Records that `name` is shadowed throughout the scope it binds in.
    /// `var`-like bindings hoist to the nearest function scope; lexical ones
    /// bind in the innermost frame. A module-level binding shadows the whole
    /// file.
    fn bind(&mut self, name: &str, var_like: bool) {
        if !self.names.contains(&name) {
            return;
        }
        let range = if var_like {
            self.frames
                .iter()
                .rev()
                .find(|f| f.kind == ScopeKind::Function)
                .map(|f| f.span.clone())
        } else {
            self.frames.last().map(|f| f.span.clone())
        };
        let range = range.unwrap_or(0..u32::MAX);
        self.index
            .ranges
            .entry(name.to_string())
            .or_default()
            .push(range);
    }

    fn bind_pat(&mut self, pat: &ast::Pat, var_like: bool) {
        let mut names = Vec::new();
        collect_pat_bindings(pat, &mut names);
        for (name, _) in names {
            self.bind(&name, var_like);
        }
    }

    fn enter(&mut self, kind: ScopeKind, span: Range<u32>) {
        self.frames.push(ShadowFrame { kind, span });
    }

    fn exit(&mut self) {
        self.frames.pop();
    }
}

impl VisitAstPath for ShadowCollector<'_> {
    fn visit_function<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::Function,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Function, convert_span(n.span));
        for param in &n.params {
            self.bind_pat(&param.pat, false);
        }
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_fn_expr<'ast: 'r, 'r>(&mut self, n: &'ast ast::FnExpr, path: &mut AstNodePath<'r>) {
        // The self-name of a named function expression shadows only inside
        // the expression.
        if let Some(ident) = &n.ident {
            self.enter(ScopeKind::Function, convert_span(n.function.span));
            self.bind(ident.sym.as_ref(), false);
            n.function.visit_with_path(self, path);
            self.exit();
        } else {
            n.function.visit_with_path(self, path);
        }
    }

    fn visit_class_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ClassExpr,
        path: &mut AstNodePath<'r>,
    ) {
        if let Some(ident) = &n.ident {
            self.enter(ScopeKind::Class, convert_span(n.class.span));
            self.bind(ident.sym.as_ref(), false);
            n.class.visit_with_path(self, path);
            self.exit();
        } else {
            n.class.visit_with_path(self, path);
        }
    }

    fn visit_arrow_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ArrowExpr,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Function, convert_span(n.span));
        for pat in &n.params {
            self.bind_pat(pat, false);
        }
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_constructor<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::Constructor,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Function, convert_span(n.span));
        for param in &n.params {
            if let ast::ParamOrTsParamProp::Param(param) = param {
                self.bind_pat(&param.pat, false);
            }
        }
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_getter_prop<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::GetterProp,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Function, convert_span(n.span));
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_setter_prop<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::SetterProp,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Function, convert_span(n.span));
        self.bind_pat(&n.param, false);
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_class<'ast: 'r, 'r>(&mut self, n: &'ast ast::Class, path: &mut AstNodePath<'r>) {
        self.enter(ScopeKind::Class, convert_span(n.span));
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_block_stmt<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::BlockStmt,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Block, convert_span(n.span));
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_static_block<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::StaticBlock,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Block, convert_span(n.span));
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_catch_clause<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::CatchClause,
        path: &mut AstNodePath<'r>,
    ) {
        self.enter(ScopeKind::Block, convert_span(n.span));
        if let Some(param) = &n.param {
            self.bind_pat(param, false);
        }
        n.visit_children_with_path(self, path);
        self.exit();
    }

    fn visit_var_decl<'ast: 'r, 'r>(&mut self, n: &'ast ast::VarDecl, path: &mut AstNodePath<'r>) {
        let var_like = matches!(n.kind, ast::VarDeclKind::Var);
        for decl in &n.decls {
            self.bind_pat(&decl.name, var_like);
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_fn_decl<'ast: 'r, 'r>(&mut self, n: &'ast ast::FnDecl, path: &mut AstNodePath<'r>) {
        self.bind(n.ident.sym.as_ref(), true);
        n.function.visit_with_path(self, path);
    }

    fn visit_class_decl<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ClassDecl,
        path: &mut AstNodePath<'r>,
    ) {
        self.bind(n.ident.sym.as_ref(), false);
        n.class.visit_with_path(self, path);
    }

    fn visit_import_decl<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ImportDecl,
        _path: &mut AstNodePath<'r>,
    ) {
        for spec in &n.specifiers {
            let local = match spec {
                ast::ImportSpecifier::Named(named) => &named.local,
                ast::ImportSpecifier::Default(default) => &default.local,
                ast::ImportSpecifier::Namespace(ns) => &ns.local,
            };
            self.bind(local.sym.as_ref(), true);
        }
    }
}

struct IdentifierCollector {
    include_imports: bool,
    scopes: ScopeStack,
    identifiers: IndexMap<String, IdentifierMeta>,
    /// References seen before any declaration of their name; attributed to a
    /// later hoist-safe declaration or dropped.
    pending_reads: IndexMap<String, Vec<Range<u32>>>,
    /// The self-name of a named function/class expression, bound into the
    /// scope the expression introduces rather than the enclosing one.
    pending_self_name: Option<String>,
    pending_catch_params: Vec<String>,
}

impl IdentifierCollector {
    fn record_declaration(&mut self, name: &str, span: Range<u32>, hoist_safe: bool) {
        let meta = self.identifiers.entry(name.to_string()).or_default();
        // Repeated `var` redeclarations collapse into one declaration group.
        if meta.declarations.is_empty() {
            meta.declarations.push(span);
        }
        if let Some(reads) = self.pending_reads.swap_remove(name) {
            if hoist_safe {
                meta.reads.extend(reads);
            }
            // let/const/class: reads preceding the declaration are in the
            // TDZ and must not be silently hoisted.
        }
    }

    fn reference(&mut self, name: &str, span: Range<u32>) {
        if self.scopes.is_bound(name) {
            return;
        }
        match self.identifiers.get_mut(name) {
            Some(meta) if !meta.declarations.is_empty() => meta.reads.push(span),
            _ => self
                .pending_reads
                .entry(name.to_string())
                .or_default()
                .push(span),
        }
    }

    fn var_eligible(&self) -> bool {
        // Top level, or a `var` inside a block nested exactly one scope layer
        // deep from module scope.
        self.scopes.only_blocks() && self.scopes.depth() <= 1
    }

    /// Walks a binding pattern: bound names become declarations (or scope
    /// bindings when not module-eligible), value-position expressions are
    /// visited as reads, computed keys are visited as reads.
    fn declare_pattern<'ast: 'r, 'r>(
        &mut self,
        pat: &'ast ast::Pat,
        eligible: bool,
        hoist_safe: bool,
        path: &mut AstNodePath<'r>,
    ) {
        match pat {
            ast::Pat::Ident(ident) => self.binding(&ident.id, eligible, hoist_safe),
            ast::Pat::Array(arr) => {
                for elem in arr.elems.iter().flatten() {
                    self.declare_pattern(elem, eligible, hoist_safe, path);
                }
            }
            ast::Pat::Rest(rest) => self.declare_pattern(&rest.arg, eligible, hoist_safe, path),
            ast::Pat::Object(obj) => {
                for prop in &obj.props {
                    match prop {
                        ast::ObjectPatProp::KeyValue(kv) => {
                            if let ast::PropName::Computed(key) = &kv.key {
                                key.expr.visit_with_path(self, path);
                            }
                            self.declare_pattern(&kv.value, eligible, hoist_safe, path);
                        }
                        ast::ObjectPatProp::Assign(assign) => {
                            self.binding(&assign.key, eligible, hoist_safe);
                            if let Some(value) = &assign.value {
                                value.visit_with_path(self, path);
                            }
                        }
                        ast::ObjectPatProp::Rest(rest) => {
                            self.declare_pattern(&rest.arg, eligible, hoist_safe, path);
                        }
                    }
                }
            }
            ast::Pat::Assign(assign) => {
                self.declare_pattern(&assign.left, eligible, hoist_safe, path);
                assign.right.visit_with_path(self, path);
            }
            ast::Pat::Expr(expr) => expr.visit_with_path(self, path),
            ast::Pat::Invalid(_) => {}
        }
    }

    fn binding(&mut self, ident: &ast::Ident, eligible: bool, hoist_safe: bool) {
        if eligible {
            self.record_declaration(ident.sym.as_ref(), convert_span(ident.span), hoist_safe);
        } else {
            self.scopes.bind(ident.sym.as_ref());
        }
    }
}

impl VisitAstPath for IdentifierCollector {
    fn visit_ident<'ast: 'r, 'r>(&mut self, n: &'ast ast::Ident, path: &mut AstNodePath<'r>) {
        if is_static_prop_key(path)
            || is_member_prop_ident(path)
            || is_label_ident(path)
            || is_export_alias(path)
        {
            return;
        }
        self.reference(n.sym.as_ref(), convert_span(n.span));
    }

    fn visit_var_decl<'ast: 'r, 'r>(&mut self, n: &'ast ast::VarDecl, path: &mut AstNodePath<'r>) {
        // A lexical declaration in a `for`/`for-in`/`for-of` head scopes to
        // the loop, not the module, even at the top level.
        let direct_module_child = matches!(
            structural_parents(path).next(),
            Some(Parent::Module(..) | Parent::ExportDecl(..))
        );
        let (eligible, hoist_safe) = match n.kind {
            ast::VarDeclKind::Var => (self.var_eligible(), true),
            _ => (self.scopes.is_empty() && direct_module_child, false),
        };
        for decl in &n.decls {
            self.declare_pattern(&decl.name, eligible, hoist_safe, path);
            if let Some(init) = &decl.init {
                init.visit_with_path(self, path);
            }
        }
    }

    fn visit_fn_decl<'ast: 'r, 'r>(&mut self, n: &'ast ast::FnDecl, path: &mut AstNodePath<'r>) {
        if self.scopes.is_empty() {
            self.record_declaration(n.ident.sym.as_ref(), convert_span(n.ident.span), true);
        } else {
            self.scopes.bind(n.ident.sym.as_ref());
        }
        n.function.visit_with_path(self, path);
    }

    fn visit_class_decl<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ClassDecl,
        path: &mut AstNodePath<'r>,
    ) {
        if self.scopes.is_empty() {
            // Class bindings are TDZ-bound: not hoist-safe.
            self.record_declaration(n.ident.sym.as_ref(), convert_span(n.ident.span), false);
        } else {
            self.scopes.bind(n.ident.sym.as_ref());
        }
        n.class.visit_with_path(self, path);
    }

    fn visit_fn_expr<'ast: 'r, 'r>(&mut self, n: &'ast ast::FnExpr, path: &mut AstNodePath<'r>) {
        // A named function expression's own name only shadows inside the
        // function; the name slot itself is neither a declaration nor a read.
        self.pending_self_name = n.ident.as_ref().map(|i| i.sym.to_string());
        n.function.visit_with_path(self, path);
    }

    fn visit_class_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ClassExpr,
        path: &mut AstNodePath<'r>,
    ) {
        self.pending_self_name = n.ident.as_ref().map(|i| i.sym.to_string());
        n.class.visit_with_path(self, path);
    }

    fn visit_function<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::Function,
        path: &mut AstNodePath<'r>,
    ) {
        self.scopes.enter(ScopeKind::Function);
        if let Some(name) = self.pending_self_name.take() {
            self.scopes.bind(&name);
        }
        for param in &n.params {
            self.declare_pattern(&param.pat, false, false, path);
        }
        if let Some(body) = &n.body {
            body.visit_with_path(self, path);
        }
        self.scopes.exit();
    }

    fn visit_arrow_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ArrowExpr,
        path: &mut AstNodePath<'r>,
    ) {
        self.scopes.enter(ScopeKind::Function);
        for pat in &n.params {
            self.declare_pattern(pat, false, false, path);
        }
        n.body.visit_with_path(self, path);
        self.scopes.exit();
    }

    fn visit_constructor<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::Constructor,
        path: &mut AstNodePath<'r>,
    ) {
        self.scopes.enter(ScopeKind::Function);
        for param in &n.params {
            match param {
                ast::ParamOrTsParamProp::Param(param) => {
                    self.declare_pattern(&param.pat, false, false, path);
                }
                ast::ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                    ast::TsParamPropParam::Ident(ident) => self.scopes.bind(ident.id.sym.as_ref()),
                    ast::TsParamPropParam::Assign(assign) => {
                        self.declare_pattern(&assign.left, false, false, path);
                        assign.right.visit_with_path(self, path);
                    }
                },
            }
        }
        if let Some(body) = &n.body {
            body.visit_with_path(self, path);
        }
        self.scopes.exit();
    }

    fn visit_getter_prop<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::GetterProp,
        path: &mut AstNodePath<'r>,
    ) {
        if let ast::PropName::Computed(key) = &n.key {
            key.expr.visit_with_path(self, path);
        }
        self.scopes.enter(ScopeKind::Function);
        if let Some(body) = &n.body {
            body.visit_with_path(self, path);
        }
        self.scopes.exit();
    }

    fn visit_setter_prop<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::SetterProp,
        path: &mut AstNodePath<'r>,
    ) {
        if let ast::PropName::Computed(key) = &n.key {
            key.expr.visit_with_path(self, path);
        }
        self.scopes.enter(ScopeKind::Function);
        self.declare_pattern(&n.param, false, false, path);
        if let Some(body) = &n.body {
            body.visit_with_path(self, path);
        }
        self.scopes.exit();
    }

    fn visit_class<'ast: 'r, 'r>(&mut self, n: &'ast ast::Class, path: &mut AstNodePath<'r>) {
        self.scopes.enter(ScopeKind::Class);
        if let Some(name) = self.pending_self_name.take() {
            self.scopes.bind(&name);
        }
        n.visit_children_with_path(self, path);
        self.scopes.exit();
    }

    fn visit_block_stmt<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::BlockStmt,
        path: &mut AstNodePath<'r>,
    ) {
        self.scopes.enter(ScopeKind::Block);
        for name in std::mem::take(&mut self.pending_catch_params) {
            self.scopes.bind(&name);
        }
        n.visit_children_with_path(self, path);
        self.scopes.exit();
    }

    fn visit_static_block<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::StaticBlock,
        path: &mut AstNodePath<'r>,
    ) {
        self.scopes.enter(ScopeKind::Block);
        n.visit_children_with_path(self, path);
        self.scopes.exit();
    }

    fn visit_catch_clause<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::CatchClause,
        path: &mut AstNodePath<'r>,
    ) {
        // The catch parameter binds inside the catch body's block scope; a
        // `var` in that body still sits one block deep from module scope.
        if let Some(param) = &n.param {
            let mut names = Vec::new();
            collect_pat_bindings(param, &mut names);
            self.pending_catch_params = names.into_iter().map(|(name, _)| name).collect();
        }
        n.body.visit_with_path(self, path);
    }

    fn visit_import_decl<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::ImportDecl,
        _path: &mut AstNodePath<'r>,
    ) {
        if !self.include_imports {
            return;
        }
        for spec in &n.specifiers {
            let local = match spec {
                ast::ImportSpecifier::Named(named) => &named.local,
                ast::ImportSpecifier::Default(default) => &default.local,
                ast::ImportSpecifier::Namespace(ns) => &ns.local,
            };
            // Import bindings hoist like function declarations.
            self.record_declaration(local.sym.as_ref(), convert_span(local.span), true);
        }
    }

    fn visit_named_export<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::NamedExport,
        path: &mut AstNodePath<'r>,
    ) {
        // Re-exports with a source reference the other module, not local
        // bindings.
        if n.src.is_some() {
            return;
        }
        n.visit_children_with_path(self, path);
    }

    fn visit_ts_type<'ast: 'r, 'r>(&mut self, _n: &'ast ast::TsType, _path: &mut AstNodePath<'r>) {
        // Type positions never read runtime bindings.
    }
}
