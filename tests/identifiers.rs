use js_module_syntax::{collect_module_identifiers, Dialect, ResolverOptions};

fn collect(src: &str) -> indexmap::IndexMap<String, js_module_syntax::IdentifierMeta> {
    collect_module_identifiers(src, Dialect::Js, &ResolverOptions::default()).unwrap()
}

#[test]
fn collects_module_scope_declarations() {
    let src = r#"
        var a = 'a'
        const b = 'b'
        let c = 'c'
        const d = (c = 'd')

        function foo() {
            const e = 'e'
            return e
        }

        const bar = function bar2(p) {
            const baz = b
            return baz
        }

        class f {
            g = 'g'
            i() { return 'j' }
        }

        {
            const k = 'k'
            var l = 'l'
        }

        if (b) {
            var p = 'p'
        }
    "#;
    let idents = collect(src);
    let keys: Vec<&str> = idents.keys().map(|k| k.as_str()).collect();

    assert_eq!(keys, ["a", "b", "c", "d", "foo", "bar", "f", "l", "p"]);
    // The assignment inside the initializer counts as a reference.
    assert_eq!(idents["c"].reads.len(), 1);
    // One read inside the function expression, one in the `if` condition.
    assert_eq!(idents["b"].reads.len(), 2);
    assert_eq!(idents["a"].reads.len(), 0);
}

#[test]
fn hoists_reads_onto_var_declarations() {
    let src = r#"
        const a = someVar
        var someVar = 's'

        const b = otherVar
        {
            var otherVar = 'o'
        }

        const c = blockTwo
        {
            {
                var blockTwo = 'deep'
            }
        }
    "#;
    let idents = collect(src);

    assert_eq!(idents["someVar"].reads.len(), 1);
    // One block layer deep still counts as module scope.
    assert_eq!(idents["otherVar"].reads.len(), 1);
    // Two layers deep does not.
    assert!(!idents.contains_key("blockTwo"));
}

#[test]
fn hoists_reads_onto_function_declarations() {
    let src = "foo();\nfunction foo() {}\n";
    let idents = collect(src);

    assert_eq!(idents["foo"].declarations.len(), 1);
    assert_eq!(idents["foo"].reads.len(), 1);
}

#[test]
fn tdz_reads_are_never_hoisted() {
    let src = r#"
        const a = (() => {
            try { return foo } catch { return 'tdz' }
        })()
        let foo = 'foo'

        const b = (() => {
            try { return Baz } catch { return 'tdz' }
        })()
        class Baz {}
    "#;
    let idents = collect(src);

    assert_eq!(idents["foo"].reads.len(), 0);
    assert_eq!(idents["Baz"].reads.len(), 0);
}

#[test]
fn undeclared_names_record_no_reads() {
    let src = "undeclaredOne;\nundeclaredOne + undeclaredTwo;\n";
    let idents = collect(src);

    assert!(!idents.contains_key("undeclaredOne"));
    assert!(!idents.contains_key("undeclaredTwo"));
    for (_, meta) in &idents {
        assert!(!meta.declarations.is_empty());
    }
}

#[test]
fn shadowed_reads_are_not_recorded() {
    let src = r#"
        let a = 'a'
        function beta(a) { return a }
        const gamma = () => {
            const zeta = a
            return zeta
        }
        const theta = function a() {
            const t = a
            return t
        }
        ;(function a(p) { return p })(a)
    "#;
    let idents = collect(src);

    // Only the closure read in `gamma` and the call argument count; the
    // parameter and the named-function-expression self names shadow the rest.
    assert_eq!(idents["a"].reads.len(), 2);
}

#[test]
fn repeated_var_redeclaration_collapses() {
    let src = "var a = 1;\nvar a = 2;\na;\n";
    let idents = collect(src);

    assert_eq!(idents["a"].declarations.len(), 1);
    assert_eq!(idents["a"].reads.len(), 1);
}

#[test]
fn import_bindings_are_opt_in() {
    let src = r#"
        import { x } from './dep.js'
        const a = x
        const b = (() => x)()
    "#;

    let idents = collect(src);
    assert!(!idents.contains_key("x"));

    let idents = collect_module_identifiers(
        src,
        Dialect::Js,
        &ResolverOptions {
            include_imports: true,
        },
    )
    .unwrap();
    assert_eq!(idents["x"].declarations.len(), 1);
    assert_eq!(idents["x"].reads.len(), 2);
}

#[test]
fn destructuring_classifies_bindings_keys_and_values() {
    let src = r#"
        const { a, b: c, [k]: d, e = f } = obj
        var k = 'k'
        var f = 'f'
        var obj = {}
    "#;
    let idents = collect(src);

    for name in ["a", "c", "d", "e"] {
        assert_eq!(idents[name].declarations.len(), 1, "{name}");
    }
    // `b` is a static key, not a binding or a read.
    assert!(!idents.contains_key("b"));
    // The computed key, the default value and the initializer are reads.
    assert_eq!(idents["k"].reads.len(), 1);
    assert_eq!(idents["f"].reads.len(), 1);
    assert_eq!(idents["obj"].reads.len(), 1);
}

#[test]
fn export_aliases_are_not_reads() {
    let src = "const a = 1;\nexport { a as b };\nexport default a;\n";
    let idents = collect(src);

    // The local slot and the default expression read; the alias does not.
    assert_eq!(idents["a"].reads.len(), 2);
    assert!(!idents.contains_key("b"));
}

#[test]
fn reexports_with_source_read_nothing() {
    let src = "const a = 1;\nexport { a } from './other.js';\n";
    let idents = collect(src);

    assert_eq!(idents["a"].reads.len(), 0);
}

#[test]
fn lexical_for_heads_stay_loop_scoped() {
    let src = "for (let i = 0; i < 2; i++) {}\nfor (var j = 0; j < 2; j++) {}\n";
    let idents = collect(src);

    assert!(!idents.contains_key("i"));
    assert_eq!(idents["j"].declarations.len(), 1);
}
