use std::ops::Range;

use swc_common::Span;
use swc_ecma_visit::fields::ExportNamedSpecifierField;
use swc_ecma_visit::AstNodePath;

use swc_ecma_visit::AstParentNodeRef as Parent;

/// Converts a [`Span`] into a standard [`Range`] of byte offsets.
pub(crate) fn convert_span(span: Span) -> Range<u32> {
    span.lo.0..span.hi.0
}

/// Walks the ancestor path from the nearest parent outwards, skipping the
/// pure sum-type wrappers (`Expr`, `Stmt`, `Pat`, `Callee`, ...) that sit
/// between structural nodes in the generated traversal.
///
/// The returned entries are the parents a grammar reader would name: for the
/// callee identifier of `require('x')` the first entry is the `CallExpr`
/// itself, not the `Callee` and `Expr` wrappers in between.
pub(crate) fn structural_parents<'a, 'r>(
    path: &'a AstNodePath<'r>,
) -> impl Iterator<Item = &'a Parent<'r>> {
    path.iter().rev().filter(|entry| !is_wrapper(entry))
}

fn is_wrapper(entry: &Parent) -> bool {
    matches!(
        entry,
        Parent::Expr(..)
            | Parent::Stmt(..)
            | Parent::Decl(..)
            | Parent::Pat(..)
            | Parent::PatOrExpr(..)
            | Parent::ModuleItem(..)
            | Parent::ModuleDecl(..)
            | Parent::Lit(..)
            | Parent::Callee(..)
            | Parent::ExprOrSpread(..)
            | Parent::BlockStmtOrExpr(..)
            | Parent::VarDeclOrExpr(..)
            | Parent::Prop(..)
            | Parent::PropOrSpread(..)
            | Parent::ObjectPatProp(..)
            | Parent::ModuleExportName(..)
            | Parent::DefaultDecl(..)
            | Parent::ParenExpr(..)
            | Parent::MemberProp(..)
            | Parent::OptChainBase(..)
            | Parent::ClassMember(..)
    )
}

/// When the current node is an unconditional top-level expression statement,
/// returns that statement's span.
///
/// Anything nested deeper (a block, an `if` arm, a sequence expression)
/// yields `None`: such positions are conditionally reached and must not be
/// treated as part of the module's static shape.
pub(crate) fn top_level_stmt_span(path: &AstNodePath) -> Option<Range<u32>> {
    let mut parents = structural_parents(path);
    let stmt = match parents.next() {
        Some(Parent::ExprStmt(stmt, _)) => stmt,
        _ => return None,
    };
    match parents.next() {
        Some(Parent::Module(..)) => Some(convert_span(stmt.span)),
        _ => None,
    }
}

/// Whether the identifier sits in a non-computed member-property position
/// (`obj.ident`). Computed properties reach the identifier through a
/// `ComputedPropName`, which this deliberately does not match.
pub(crate) fn is_member_prop_ident(path: &AstNodePath) -> bool {
    matches!(path.last(), Some(Parent::MemberProp(..)))
}

/// Whether the identifier is a static (non-computed) property key: object
/// literal keys, class method/property keys, object method keys. All of
/// these reach the identifier through a `PropName`.
pub(crate) fn is_static_prop_key(path: &AstNodePath) -> bool {
    matches!(path.last(), Some(Parent::PropName(..)))
}

/// Whether the identifier is a label or a `break`/`continue` label
/// reference. Labels live in their own namespace and are never module-scope
/// reads.
pub(crate) fn is_label_ident(path: &AstNodePath) -> bool {
    matches!(
        path.last(),
        Some(Parent::LabeledStmt(..) | Parent::BreakStmt(..) | Parent::ContinueStmt(..))
    )
}

/// Whether the identifier is the name slot of a function/class declaration
/// or expression. Name slots are bindings, never reads.
pub(crate) fn is_name_slot(path: &AstNodePath) -> bool {
    matches!(
        path.last(),
        Some(
            Parent::FnDecl(..) | Parent::ClassDecl(..) | Parent::FnExpr(..) | Parent::ClassExpr(..)
        )
    )
}

/// Whether the identifier is a declaration binding (declarator name,
/// parameter, catch param). Simple assignment targets also parse as binding
/// identifiers but are references, so they are excluded.
pub(crate) fn is_declaration_binding(path: &AstNodePath) -> bool {
    let mut parents = structural_parents(path);
    if !matches!(parents.next(), Some(Parent::BindingIdent(..))) {
        return false;
    }
    !matches!(parents.next(), Some(Parent::AssignExpr(..)))
}

/// Whether the identifier is the alias slot of an export specifier
/// (`export { local as alias }` or `export * as alias from '...'`). The
/// alias names the export, not a local binding.
pub(crate) fn is_export_alias(path: &AstNodePath) -> bool {
    let mut rev = path.iter().rev();
    matches!(rev.next(), Some(Parent::ModuleExportName(..)))
        && matches!(
            rev.next(),
            Some(
                Parent::ExportNamedSpecifier(_, ExportNamedSpecifierField::Exported)
                    | Parent::ExportNamespaceSpecifier(..)
            )
        )
}
