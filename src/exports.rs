use std::collections::HashMap;
use std::ops::Range;

use indexmap::IndexMap;
use swc_ecma_visit::swc_ecma_ast as ast;
use swc_ecma_visit::{AstNodePath, VisitAstPath, VisitWithPath};

use swc_common::Spanned;

use crate::scope::{build_shadow_index, ShadowIndex};
use crate::walk::{convert_span, top_level_stmt_span};
use crate::{Dialect, TransformError};

/// Which CommonJS surface an export was written through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportVia {
    pub exports: bool,
    pub module_exports: bool,
}

/// A single write to an export key.
#[derive(Debug, Clone)]
pub struct ExportWrite {
    /// Span of the whole assignment (or helper call) performing the write.
    pub span: Range<u32>,
    /// Span of the written value expression, when there is a single one.
    pub value: Option<Range<u32>>,
    /// Span of the enclosing statement when the write is an unconditional
    /// top-level statement; `None` for nested or conditionally reached
    /// writes.
    pub stmt: Option<Range<u32>>,
}

/// The reconstructed surface of one CommonJS export key.
///
/// `'default'` is reserved for whole-object export forms (`module.exports =`
/// and bare `exports =`).
#[derive(Debug, Clone, Default)]
pub struct ExportEntry {
    pub writes: Vec<ExportWrite>,
    pub via: ExportVia,
    /// The local identifier the key was assigned from, when the written
    /// value was a bare identifier. Enables direct re-export instead of
    /// indirection.
    pub from_identifier: Option<String>,
    /// Later reassignments of `from_identifier`, tracked for live-binding
    /// fidelity.
    pub reassignments: Vec<Range<u32>>,
    /// Whether the key was defined through `Object.defineProperty`-style
    /// descriptors rather than plain assignment.
    pub has_getter: bool,
}

/// Statically reconstructs the CommonJS export table of `src`.
///
/// Recognizes assignments through `exports`, `module.exports`, local aliases
/// of either, `Object.assign(exports, {...})` and
/// `Object.defineProperty`/`defineProperties` descriptors, as well as
/// destructuring assignments targeting export members. Literal keys may be
/// resolved through previously bound string/number constants.
///
/// # Examples
///
/// ```
/// use js_module_syntax::{collect_cjs_exports, Dialect};
///
/// let src = "exports.foo = 1; module.exports.bar = foo;";
/// let exports = collect_cjs_exports(src, Dialect::Js).unwrap();
///
/// assert!(exports.contains_key("foo"));
/// assert_eq!(exports["bar"].from_identifier.as_deref(), Some("foo"));
/// ```
pub fn collect_cjs_exports(
    src: &str,
    dialect: Dialect,
) -> Result<IndexMap<String, ExportEntry>, TransformError> {
    let module = crate::parse::parse_module(src, dialect)?;
    Ok(collect_exports_from_module(&module))
}

pub(crate) fn collect_exports_from_module(
    module: &ast::Module,
) -> IndexMap<String, ExportEntry> {
    tracing::trace_span!("collecting cjs exports").in_scope(|| {
        let shadows = build_shadow_index(module, &["exports", "module"]);
        let mut collector = ExportCollector {
            shadows,
            exports: IndexMap::new(),
            local_to_export: HashMap::new(),
            aliases: HashMap::new(),
            literals: HashMap::new(),
        };
        module.visit_children_with_path(&mut collector, &mut Default::default());
        collector.exports
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Via {
    Exports,
    ModuleExports,
}

struct ExportCollector {
    shadows: ShadowIndex,
    exports: IndexMap<String, ExportEntry>,
    /// Local identifier -> export keys it was assigned to.
    local_to_export: HashMap<String, Vec<String>>,
    /// Local aliases of `exports`/`module.exports`.
    aliases: HashMap<String, Via>,
    /// Local string/number constants usable as computed property keys.
    literals: HashMap<String, String>,
}

impl ExportCollector {
    fn global(&self, ident: &ast::Ident, name: &str) -> bool {
        ident.sym.as_ref() == name && !self.shadows.is_shadowed(name, ident.span.lo.0)
    }

    fn is_module_exports(&self, expr: &ast::Expr) -> bool {
        match expr {
            ast::Expr::Member(member) => {
                matches!(&*member.obj, ast::Expr::Ident(obj) if self.global(obj, "module"))
                    && matches!(&member.prop, ast::MemberProp::Ident(prop) if prop.sym.as_ref() == "exports")
            }
            _ => false,
        }
    }

    fn resolve_base(&self, expr: &ast::Expr) -> Option<Via> {
        match expr {
            ast::Expr::Ident(ident) if self.global(ident, "exports") => Some(Via::Exports),
            ast::Expr::Ident(ident) => self.aliases.get(ident.sym.as_ref()).copied(),
            _ if self.is_module_exports(expr) => Some(Via::ModuleExports),
            _ => None,
        }
    }

    fn member_key(&self, prop: &ast::MemberProp) -> Option<String> {
        match prop {
            ast::MemberProp::Ident(ident) => Some(ident.sym.to_string()),
            ast::MemberProp::Computed(computed) => self.literal_value(&computed.expr),
            ast::MemberProp::PrivateName(_) => None,
        }
    }

    fn literal_value(&self, expr: &ast::Expr) -> Option<String> {
        match expr {
            ast::Expr::Lit(ast::Lit::Str(s)) => Some(s.value.to_string()),
            ast::Expr::Lit(ast::Lit::Num(n)) => Some(n.value.to_string()),
            ast::Expr::Tpl(tpl) if tpl.exprs.is_empty() && tpl.quasis.len() == 1 => {
                let quasi = &tpl.quasis[0];
                Some(
                    quasi
                        .cooked
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| quasi.raw.to_string()),
                )
            }
            ast::Expr::Ident(ident) => self.literals.get(ident.sym.as_ref()).cloned(),
            _ => None,
        }
    }

    fn prop_name_key(&self, prop: &ast::PropName) -> Option<String> {
        match prop {
            ast::PropName::Ident(ident) => Some(ident.sym.to_string()),
            ast::PropName::Str(s) => Some(s.value.to_string()),
            ast::PropName::Num(n) => Some(n.value.to_string()),
            ast::PropName::Computed(computed) => self.literal_value(&computed.expr),
            ast::PropName::BigInt(_) => None,
        }
    }

    /// Resolves an assignment target to the export key it writes.
    fn resolve_export_target(&self, expr: &ast::Expr) -> Option<(String, Via)> {
        // Whole-object forms claim the reserved 'default' key.
        if let ast::Expr::Ident(ident) = expr {
            if self.global(ident, "exports") {
                return Some(("default".into(), Via::Exports));
            }
            return None;
        }
        if self.is_module_exports(expr) {
            return Some(("default".into(), Via::ModuleExports));
        }

        let member = match expr {
            ast::Expr::Member(member) => member,
            _ => return None,
        };
        let key = self.member_key(&member.prop)?;
        let via = self.resolve_base(&member.obj)?;
        Some((key, via))
    }

    fn add_export(
        &mut self,
        key: String,
        via: Via,
        write: ExportWrite,
        rhs: Option<&ast::Ident>,
    ) {
        let entry = self.exports.entry(key.clone()).or_default();
        match via {
            Via::Exports => entry.via.exports = true,
            Via::ModuleExports => entry.via.module_exports = true,
        }
        entry.writes.push(write);

        if let Some(rhs) = rhs {
            let name = rhs.sym.to_string();
            entry.from_identifier.get_or_insert_with(|| name.clone());
            let keys = self.local_to_export.entry(name).or_default();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    fn descriptor_info<'e>(&self, descriptor: &'e ast::Expr) -> (bool, Option<&'e ast::Ident>) {
        let mut has_getter = false;
        let mut value_ident = None;
        if let ast::Expr::Object(obj) = descriptor {
            for prop in &obj.props {
                match prop {
                    ast::PropOrSpread::Prop(prop) => match &**prop {
                        ast::Prop::KeyValue(kv) => {
                            match self.prop_name_key(&kv.key).as_deref() {
                                Some("get") => has_getter = true,
                                Some("value") => {
                                    if let ast::Expr::Ident(ident) = &*kv.value {
                                        value_ident = Some(ident);
                                    }
                                }
                                _ => {}
                            }
                        }
                        ast::Prop::Method(method) => {
                            if self.prop_name_key(&method.key).as_deref() == Some("get") {
                                has_getter = true;
                            }
                        }
                        _ => {}
                    },
                    ast::PropOrSpread::Spread(_) => {}
                }
            }
        }
        (has_getter, value_ident)
    }
}

impl VisitAstPath for ExportCollector {
    fn visit_var_declarator<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::VarDeclarator,
        path: &mut AstNodePath<'r>,
    ) {
        if let (ast::Pat::Ident(name), Some(init)) = (&n.name, &n.init) {
            if let Some(via) = self.resolve_base(init) {
                self.aliases.insert(name.id.sym.to_string(), via);
            }
            if let Some(value) = self.literal_value(init) {
                self.literals.insert(name.id.sym.to_string(), value);
            }
        }

        // `const { exports: e } = module` aliases `e` to `module.exports`.
        if let (ast::Pat::Object(obj), Some(init)) = (&n.name, &n.init) {
            if matches!(&**init, ast::Expr::Ident(ident) if self.global(ident, "module")) {
                for prop in &obj.props {
                    if let ast::ObjectPatProp::KeyValue(kv) = prop {
                        if self.prop_name_key(&kv.key).as_deref() == Some("exports") {
                            if let ast::Pat::Ident(binding) = &*kv.value {
                                self.aliases
                                    .insert(binding.id.sym.to_string(), Via::ModuleExports);
                            }
                        }
                    }
                }
            }
        }

        n.visit_children_with_path(self, path);
    }

    fn visit_assign_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::AssignExpr,
        path: &mut AstNodePath<'r>,
    ) {
        if n.op != ast::AssignOp::Assign {
            n.visit_children_with_path(self, path);
            return;
        }

        let stmt = top_level_stmt_span(path);
        let write = ExportWrite {
            span: convert_span(n.span),
            value: Some(convert_span(n.right.span())),
            stmt: stmt.clone(),
        };

        match &n.left {
            ast::PatOrExpr::Expr(left) => {
                if let Some((key, via)) = self.resolve_export_target(left) {
                    let rhs = match &*n.right {
                        ast::Expr::Ident(ident) => Some(ident),
                        _ => None,
                    };
                    self.add_export(key, via, write, rhs);
                    n.visit_children_with_path(self, path);
                    return;
                }
            }
            ast::PatOrExpr::Pat(left) => match &**left {
                ast::Pat::Ident(binding) => {
                    let name = binding.id.sym.as_ref();
                    // Bare `exports = value` claims the reserved default key.
                    if self.global(&binding.id, "exports") {
                        let rhs = match &*n.right {
                            ast::Expr::Ident(ident) => Some(ident),
                            _ => None,
                        };
                        self.add_export("default".into(), Via::Exports, write, rhs);
                        n.visit_children_with_path(self, path);
                        return;
                    }
                    // Aliasing by assignment: `e = module.exports`.
                    if let Some(via) = self.resolve_base(&n.right) {
                        self.aliases.insert(name.to_string(), via);
                    }
                    if let Some(keys) = self.local_to_export.get(name) {
                        let span = convert_span(n.span);
                        for key in keys.clone() {
                            if let Some(entry) = self.exports.get_mut(&key) {
                                entry.reassignments.push(span.clone());
                            }
                        }
                    }
                }
                ast::Pat::Expr(left) => {
                    if let Some((key, via)) = self.resolve_export_target(left) {
                        let rhs = match &*n.right {
                            ast::Expr::Ident(ident) => Some(ident),
                            _ => None,
                        };
                        self.add_export(key, via, write, rhs);
                        n.visit_children_with_path(self, path);
                        return;
                    }
                }
                // Destructuring assignment into export members:
                // `({ a: exports.a } = source)`.
                ast::Pat::Object(obj) => {
                    for prop in &obj.props {
                        if let ast::ObjectPatProp::KeyValue(kv) = prop {
                            if let ast::Pat::Expr(target) = &*kv.value {
                                if let Some((key, via)) = self.resolve_export_target(target) {
                                    self.add_export(
                                        key,
                                        via,
                                        ExportWrite {
                                            span: convert_span(n.span),
                                            value: None,
                                            stmt: stmt.clone(),
                                        },
                                        None,
                                    );
                                }
                            }
                        }
                    }
                }
                _ => {}
            },
        }

        n.visit_children_with_path(self, path);
    }

    fn visit_call_expr<'ast: 'r, 'r>(
        &mut self,
        n: &'ast ast::CallExpr,
        path: &mut AstNodePath<'r>,
    ) {
        let callee = match &n.callee {
            ast::Callee::Expr(expr) => &**expr,
            _ => {
                n.visit_children_with_path(self, path);
                return;
            }
        };

        let method = match callee {
            ast::Expr::Member(member) => {
                let is_object = matches!(
                    &*member.obj,
                    ast::Expr::Ident(obj) if obj.sym.as_ref() == "Object"
                );
                match (&member.prop, is_object) {
                    (ast::MemberProp::Ident(prop), true) => Some(prop.sym.as_ref()),
                    _ => None,
                }
            }
            _ => None,
        };

        let stmt = top_level_stmt_span(path);
        let span = convert_span(n.span);

        match method {
            Some("assign") if n.args.len() >= 2 => {
                if let Some(via) = n.args[0]
                    .spread
                    .is_none()
                    .then(|| self.resolve_base(&n.args[0].expr))
                    .flatten()
                {
                    for arg in &n.args[1..] {
                        if let ast::Expr::Object(obj) = &*arg.expr {
                            for prop in &obj.props {
                                let kv = match prop {
                                    ast::PropOrSpread::Prop(prop) => match &**prop {
                                        ast::Prop::KeyValue(kv) => Some((
                                            self.prop_name_key(&kv.key),
                                            match &*kv.value {
                                                ast::Expr::Ident(ident) => Some(ident),
                                                _ => None,
                                            },
                                            convert_span(kv.value.span()),
                                        )),
                                        ast::Prop::Shorthand(ident) => Some((
                                            Some(ident.sym.to_string()),
                                            Some(ident),
                                            convert_span(ident.span),
                                        )),
                                        _ => None,
                                    },
                                    ast::PropOrSpread::Spread(_) => None,
                                };
                                if let Some((Some(key), rhs, value_span)) = kv {
                                    self.add_export(
                                        key,
                                        via,
                                        ExportWrite {
                                            span: span.clone(),
                                            value: Some(value_span),
                                            stmt: stmt.clone(),
                                        },
                                        rhs,
                                    );
                                }
                            }
                        }
                    }
                }
            }
            Some("defineProperty") if n.args.len() >= 3 => {
                if let Some(via) = self.resolve_base(&n.args[0].expr) {
                    if let Some(key) = self.literal_value(&n.args[1].expr) {
                        let (has_getter, value_ident) = self.descriptor_info(&n.args[2].expr);
                        self.add_export(
                            key.clone(),
                            via,
                            ExportWrite {
                                span: span.clone(),
                                value: None,
                                stmt: stmt.clone(),
                            },
                            value_ident,
                        );
                        let entry = self.exports.entry(key).or_default();
                        entry.has_getter |= has_getter || value_ident.is_none();
                    }
                }
            }
            Some("defineProperties") if n.args.len() >= 2 => {
                if let Some(via) = self.resolve_base(&n.args[0].expr) {
                    if let ast::Expr::Object(obj) = &*n.args[1].expr {
                        for prop in &obj.props {
                            if let ast::PropOrSpread::Prop(prop) = prop {
                                if let ast::Prop::KeyValue(kv) = &**prop {
                                    if let Some(key) = self.prop_name_key(&kv.key) {
                                        let (has_getter, value_ident) =
                                            self.descriptor_info(&kv.value);
                                        self.add_export(
                                            key.clone(),
                                            via,
                                            ExportWrite {
                                                span: span.clone(),
                                                value: None,
                                                stmt: stmt.clone(),
                                            },
                                            value_ident,
                                        );
                                        let entry = self.exports.entry(key).or_default();
                                        entry.has_getter |= has_getter || value_ident.is_none();
                                    }
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }

        n.visit_children_with_path(self, path);
    }
}
