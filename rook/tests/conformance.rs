//! Conformance checks: the quantified invariants, round trips and
//! boundary behaviours of the engine contract.

use pretty_assertions::assert_eq;
use rook::{Engine, RookError, Term};

fn engine() -> Engine {
    Engine::new().expect("engine starts")
}

fn one(env: &mut Engine, goal: &str) -> rook::Solution {
    env.query_once(goal)
        .unwrap_or_else(|e| panic!("goal {:?} errored: {}", goal, e))
        .unwrap_or_else(|| panic!("goal {:?} failed", goal))
}

fn shown(env: &Engine, solution: &rook::Solution, name: &str) -> String {
    let term = solution
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, t)| t.clone())
        .unwrap_or_else(|| panic!("no binding for {}", name));
    env.format_term(&term)
}

fn fails(env: &mut Engine, goal: &str) {
    assert!(
        env.query_once(goal).expect("goal runs").is_none(),
        "goal {:?} should fail",
        goal
    );
}

fn raises(env: &mut Engine, goal: &str, fragment: &str) {
    match env.query_once(goal) {
        Err(RookError::Uncaught(ball)) => {
            let text = env.format_term(&ball);
            assert!(
                text.contains(fragment),
                "goal {:?} raised {} (wanted {})",
                goal,
                text,
                fragment
            );
        }
        other => panic!(
            "goal {:?} should raise {}, got {:?}",
            goal,
            fragment,
            other.map(|_| ())
        ),
    }
}

// ---- quantified invariants -----------------------------------------------

#[test]
fn self_unification_adds_no_bindings() {
    let mut trail = rook::trail::Trail::new();
    for t in [
        Term::atom("a"),
        Term::int(42),
        Term::float(1.5),
        Term::compound("f", vec![Term::atom("x"), Term::list(vec![Term::int(1)])]),
    ] {
        assert!(rook::unify::unify(&mut trail, &t, &t.clone()));
        assert_eq!(trail.depth(), 0, "no trail entries for {}", t);
    }
}

#[test]
fn failed_unification_restores_trail_depth() {
    let mut trail = rook::trail::Trail::new();
    let x = Term::var();
    let a = Term::compound("f", vec![x.clone(), Term::atom("a")]);
    let b = Term::compound("f", vec![Term::atom("b"), Term::atom("c")]);
    let before = trail.depth();
    assert!(!rook::unify::unify_or_undo(&mut trail, &a, &b));
    assert_eq!(trail.depth(), before);
}

#[test]
fn fresh_activation_shares_no_variables_with_the_call() {
    let mut env = engine();
    env.consult_str("wrap(X, f(X)).").expect("consult");
    // If activation leaked template variables, repeated calls would
    // interfere; each call gets a fresh copy.
    let s1 = one(&mut env, "wrap(1, R)");
    let s2 = one(&mut env, "wrap(2, R)");
    assert_eq!(shown(&env, &s1, "R"), "f(1)");
    assert_eq!(shown(&env, &s2, "R"), "f(2)");
}

#[test]
fn numbers_evaluate_to_themselves() {
    let mut env = engine();
    let s = one(&mut env, "X is 42, Y is 2.5");
    assert_eq!(shown(&env, &s, "X"), "42");
    assert_eq!(shown(&env, &s, "Y"), "2.5");
}

#[test]
fn dynamic_clauses_enumerate_in_insertion_order() {
    let mut env = engine();
    env.consult_str(":- dynamic(d/1).").expect("consult");
    for i in 1..=5 {
        env.assertz(&format!("d({})", i)).expect("assert");
    }
    let s = one(&mut env, "findall(X, d(X), L)");
    assert_eq!(shown(&env, &s, "L"), "[1,2,3,4,5]");

    // asserta prepends.
    env.asserta("d(0)").expect("assert");
    let s = one(&mut env, "findall(X, d(X), L)");
    assert_eq!(shown(&env, &s, "L"), "[0,1,2,3,4,5]");
}

#[test]
fn sort_orders_by_standard_order_and_dedups() {
    let mut env = engine();
    let s = one(&mut env, "sort([b, 2, a, f(x), 1.0, b, Z], L)");
    // Var < numbers (1.0 before 1? no 2 only) < atoms < compound.
    let text = shown(&env, &s, "L");
    assert!(text.starts_with("[_"), "variables first: {}", text);
    assert!(text.ends_with("f(x)]"), "compounds last: {}", text);
    // Duplicate atom b removed.
    assert_eq!(text.matches('b').count(), 1);

    let s = one(&mut env, "msort([c, a, b, a], L)");
    assert_eq!(shown(&env, &s, "L"), "[a,a,b,c]");
}

#[test]
fn compare_and_order_predicates() {
    let mut env = engine();
    assert!(env.query_once("1.0 @< 1").expect("runs").is_some());
    assert!(env.query_once("a @< f(a)").expect("runs").is_some());
    let s = one(&mut env, "compare(O, f(a), f(b))");
    assert_eq!(shown(&env, &s, "O"), "<");
}

// ---- round trips ---------------------------------------------------------

#[test]
fn number_chars_round_trip() {
    let mut env = engine();
    for literal in ["42", "-7", "3.14", "0.5"] {
        let s = one(
            &mut env,
            &format!("number_chars({}, Cs), number_chars(N, Cs)", literal),
        );
        assert_eq!(shown(&env, &s, "N"), literal, "round trip of {}", literal);
    }
}

#[test]
fn atom_chars_round_trip() {
    let mut env = engine();
    let s = one(&mut env, "atom_chars(hello, Cs), atom_chars(A, Cs)");
    assert_eq!(shown(&env, &s, "A"), "hello");
    let s = one(&mut env, "atom_codes(abc, Cs), atom_codes(A, Cs)");
    assert_eq!(shown(&env, &s, "A"), "abc");
}

#[test]
fn copy_term_detaches_bindings() {
    let mut env = engine();
    let s = one(&mut env, "copy_term(f(X, X, Y), T), T = f(1, A, B)");
    assert_eq!(shown(&env, &s, "A"), "1");
    // The original X is untouched by binding the copy.
    assert!(shown(&env, &s, "X").starts_with('_'));
}

#[test]
fn double_reverse_is_identity() {
    let mut env = engine();
    let s = one(&mut env, "reverse([1,2,3,4], R), reverse(R, L)");
    assert_eq!(shown(&env, &s, "R"), "[4,3,2,1]");
    assert_eq!(shown(&env, &s, "L"), "[1,2,3,4]");
}

// ---- boundary behaviour --------------------------------------------------

#[test]
fn arg_boundaries() {
    let mut env = engine();
    fails(&mut env, "arg(0, f(a,b,c), _)");
    fails(&mut env, "arg(4, f(a,b,c), _)");
    raises(&mut env, "arg(-1, f(a), _)", "not_less_than_zero");
    let s = one(&mut env, "arg(2, f(a,b,c), X)");
    assert_eq!(shown(&env, &s, "X"), "b");
}

#[test]
fn length_enumerates_up_to_a_bound_then_fails() {
    std::env::set_var("ROOK_LENGTH_CAP", "5");
    let mut env = engine();
    std::env::remove_var("ROOK_LENGTH_CAP");
    let solutions = env.query("length(L, N)").expect("query");
    // Lengths 0..=5, then the cap stops generation.
    assert_eq!(solutions.len(), 6);
    assert_eq!(shown(&env, &solutions[0], "N"), "0");
    assert_eq!(shown(&env, &solutions[5], "N"), "5");
}

#[test]
fn integer_overflow_raises_evaluation_error() {
    let mut env = engine();
    raises(
        &mut env,
        "X is 9223372036854775807 + 1",
        "int_overflow",
    );
    raises(&mut env, "X is 2 ** nope", "type_error");
}

#[test]
fn zero_divisor_and_undefined() {
    let mut env = engine();
    raises(&mut env, "X is 1 // 0", "zero_divisor");
    raises(&mut env, "X is log(0)", "evaluation_error");
    raises(&mut env, "X is foo(1)", "evaluable");
}

#[test]
fn functor_and_univ() {
    let mut env = engine();
    let s = one(&mut env, "functor(foo(a, b), N, A)");
    assert_eq!(shown(&env, &s, "N"), "foo");
    assert_eq!(shown(&env, &s, "A"), "2");

    let s = one(&mut env, "functor(T, point, 2)");
    assert!(shown(&env, &s, "T").starts_with("point("));

    let s = one(&mut env, "foo(a, b) =.. L");
    assert_eq!(shown(&env, &s, "L"), "[foo,a,b]");
    let s = one(&mut env, "T =.. [bar, 1, 2]");
    assert_eq!(shown(&env, &s, "T"), "bar(1,2)");
}

#[test]
fn between_and_succ() {
    let mut env = engine();
    let solutions = env.query("between(1, 4, X)").expect("query");
    assert_eq!(solutions.len(), 4);
    fails(&mut env, "between(3, 1, _)");
    let s = one(&mut env, "succ(4, X), succ(Y, 4)");
    assert_eq!(shown(&env, &s, "X"), "5");
    assert_eq!(shown(&env, &s, "Y"), "3");
}

#[test]
fn atom_concat_and_sub_atom_enumerate() {
    let mut env = engine();
    let s = one(&mut env, "atom_concat(foo, bar, X)");
    assert_eq!(shown(&env, &s, "X"), "foobar");

    let splits = env.query("atom_concat(A, B, abc)").expect("query");
    assert_eq!(splits.len(), 4);
    assert_eq!(shown(&env, &splits[0], "A"), "");
    assert_eq!(shown(&env, &splits[1], "A"), "a");
    assert_eq!(shown(&env, &splits[3], "B"), "");

    let subs = env.query("sub_atom(abc, B, 2, A, Sub)").expect("query");
    assert_eq!(subs.len(), 2);
    assert_eq!(shown(&env, &subs[0], "Sub"), "ab");
    assert_eq!(shown(&env, &subs[1], "Sub"), "bc");
}

#[test]
fn occurs_check_variant() {
    let mut env = engine();
    fails(&mut env, "unify_with_occurs_check(X, f(X))");
    assert!(env
        .query_once("unify_with_occurs_check(X, f(Y))")
        .expect("runs")
        .is_some());
}

#[test]
fn term_variables_in_order() {
    let mut env = engine();
    let s = one(&mut env, "term_variables(f(B, g(A, B), C), Vs), Vs = [X, Y, Z]");
    // First occurrence order: B, A, C.
    assert_eq!(shown(&env, &s, "X"), shown(&env, &s, "B"));
    assert_eq!(shown(&env, &s, "Y"), shown(&env, &s, "A"));
    assert_eq!(shown(&env, &s, "Z"), shown(&env, &s, "C"));
}

#[test]
fn keysort_is_stable() {
    let mut env = engine();
    let s = one(&mut env, "keysort([b-1, a-1, b-2, a-2], L)");
    assert_eq!(shown(&env, &s, "L"), "[a-1,a-2,b-1,b-2]");
}

#[test]
fn catch_rethrows_unmatched_balls() {
    let mut env = engine();
    let s = one(
        &mut env,
        "catch(catch(throw(inner), nomatch, R = wrong), inner, R = right)",
    );
    assert_eq!(shown(&env, &s, "R"), "right");
}

#[test]
fn forall_checks_all_solutions() {
    let mut env = engine();
    assert!(env
        .query_once("forall(member(X, [1,2,3]), X > 0)")
        .expect("runs")
        .is_some());
    fails(&mut env, "forall(member(X, [1,2,3]), X > 1)");
}

#[test]
fn repeat_with_cut_terminates() {
    let mut env = engine();
    assert!(env.query_once("repeat, !").expect("runs").is_some());
}

#[test]
fn findall_with_nested_findall() {
    let mut env = engine();
    let s = one(
        &mut env,
        "findall(Inner, (member(X, [1,2]), findall(Y-X, member(Y, [a,b]), Inner)), L)",
    );
    assert_eq!(shown(&env, &s, "L"), "[[a-1,b-1],[a-2,b-2]]");
}

#[test]
fn protected_library_predicates() {
    let mut env = engine();
    match env.query_once("assertz(member(x, y))") {
        Err(RookError::Uncaught(ball)) => {
            assert!(env.format_term(&ball).contains("permission_error"));
        }
        other => panic!("expected permission error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn if_then_else_condition_cut_is_local() {
    let mut env = engine();
    env.consult_str("t(1). t(2).").expect("consult");
    // The cut inside the condition does not cut t/1's alternatives.
    let solutions = env.query("t(X), (! -> true ; fail)").expect("query");
    assert_eq!(solutions.len(), 2);
}
