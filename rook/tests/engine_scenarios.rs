//! End-to-end scenarios for the rook engine, exercising the full stack:
//! reader, database, resolution, builtins and the goal lifecycle.

use pretty_assertions::assert_eq;
use rook::{Engine, Exec, RookError, Term};

fn engine() -> Engine {
    Engine::new().expect("engine starts")
}

fn binding(solution: &rook::Solution, name: &str) -> Term {
    solution
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, t)| t.clone())
        .unwrap_or_else(|| panic!("no binding for {}", name))
}

fn rendered(engine: &Engine, solution: &rook::Solution, name: &str) -> String {
    engine.format_term(&binding(solution, name))
}

/// Comprehensive smoke test of the embedding surface.
#[test]
fn smoke_test_engine() {
    let _ = env_logger::builder().is_test(true).try_init();
    println!("=== Rook Engine Smoke Test ===");

    println!("\n[1] Creating engine...");
    let mut env = engine();
    println!("    OK: engine created");

    println!("\n[2] Testing basic arithmetic...");
    let solution = env.query_once("X is 10 + 20 * 3").expect("arithmetic");
    assert_eq!(rendered(&env, &solution.unwrap(), "X"), "70");

    println!("\n[3] Asserting family facts...");
    env.assertz("person(alice)").expect("assert");
    env.assertz("person(bob)").expect("assert");
    env.assertz("parent(alice, bob)").expect("assert");
    env.assertz("parent(bob, charlie)").expect("assert");

    println!("\n[4] Defining grandparent rule...");
    env.assertz("grandparent(X, Z) :- parent(X, Y), parent(Y, Z)")
        .expect("assert rule");
    let solution = env
        .query_once("grandparent(alice, Who)")
        .expect("query")
        .expect("one solution");
    assert_eq!(rendered(&env, &solution, "Who"), "charlie");

    println!("\n[5] List operations...");
    let solution = env
        .query_once("append([1,2], [3,4], L)")
        .expect("append")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "L"), "[1,2,3,4]");

    println!("\n[6] Multiple solutions...");
    let solutions = env.query("person(X)").expect("query");
    assert_eq!(solutions.len(), 2);

    println!("\n[7] JSON bindings...");
    let json = env.query_with_bindings("person(X)").expect("json");
    assert!(json.contains("alice") && json.contains("bob"));

    println!("\n=== Smoke Test PASSED ===");
}

#[test]
fn scenario_findall_preserves_assert_order() {
    let mut env = engine();
    let solution = env
        .query_once("assertz(fact(a)), assertz(fact(b)), findall(X, fact(X), L)")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "L"), "[a,b]");
}

#[test]
fn scenario_cut_commits_to_first_clause() {
    let mut env = engine();
    env.consult_str("p(X) :- X = 1, !.\np(X) :- X = 2.")
        .expect("consult");
    let read = env.parse_goal("p(X)").expect("goal parses");
    let handle = env.prepare(read.term.clone()).expect("prepare");
    let first = env.next(handle).expect("first solution");
    assert_eq!(first, Exec::SuccessLast);
    let x = read
        .bindings
        .iter()
        .find(|(n, _)| n == "X")
        .map(|(_, t)| t.deref())
        .expect("X bound");
    assert!(matches!(x, Term::Int(1)));
}

#[test]
fn scenario_catch_zero_divisor() {
    let mut env = engine();
    let solution = env
        .query_once("catch((X is 1/0), error(evaluation_error(zero_divisor), _), X = caught)")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "X"), "caught");
}

#[test]
fn scenario_dcg_phrase() {
    let mut env = engine();
    env.consult_str("as --> [].\nas --> [a], as.")
        .expect("consult grammar");
    let good = env.parse_goal("phrase(as, [a,a,a])").unwrap().term;
    assert!(env.run_once_term(&good).expect("phrase runs"));
    let bad = env.parse_goal("phrase(as, [a,b])").unwrap().term;
    assert!(!env.run_once_term(&bad).expect("phrase runs"));
}

#[test]
fn scenario_setof_cross_product() {
    let mut env = engine();
    let solution = env
        .query_once("setof(X-Y, (member(X, [2,1]), member(Y, [b,a])), L)")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "L"), "[1-a,1-b,2-a,2-b]");
}

#[test]
fn scenario_cleanup_on_client_commit() {
    let mut env = engine();
    env.consult_str(":- dynamic(cleanup_ran/1).").expect("consult");
    // The guarded call succeeds nondeterministically (member leaves a
    // choice point); committing from the client side runs the cleanup with
    // catcher `exit`.
    let solution = env
        .query_once(
            "setup_call_catcher_cleanup(true, (member(X, [1,2,3]), X > 2), C, \
             assertz(cleanup_ran(C)))",
        )
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "X"), "3");

    let runs = env.query("cleanup_ran(V)").expect("query");
    assert_eq!(runs.len(), 1, "cleanup must run exactly once");
    assert_eq!(rendered(&env, &runs[0], "V"), "exit");
}

#[test]
fn cleanup_on_deterministic_exit() {
    let mut env = engine();
    env.consult_str(":- dynamic(done/1).").expect("consult");
    let solution = env
        .query_once("setup_call_catcher_cleanup(true, true, C, assertz(done(C))), done(W)")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "W"), "exit");
}

#[test]
fn cleanup_on_failure() {
    let mut env = engine();
    env.consult_str(":- dynamic(done/1).").expect("consult");
    assert!(env.query_once("setup_call_catcher_cleanup(true, fail, _, assertz(done(failed)))")
        .expect("query")
        .is_none());
    let runs = env.query("done(V)").expect("query");
    assert_eq!(runs.len(), 1);
    assert_eq!(rendered(&env, &runs[0], "V"), "failed");
}

#[test]
fn cleanup_on_cut() {
    let mut env = engine();
    env.consult_str(":- dynamic(done/1).").expect("consult");
    let solution = env
        .query_once(
            "setup_call_catcher_cleanup(true, member(X, [1,2]), C, assertz(done(C))), !, done(W)",
        )
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "W"), "!");
}

#[test]
fn cleanup_on_exception() {
    let mut env = engine();
    env.consult_str(":- dynamic(done/1).").expect("consult");
    let solution = env
        .query_once(
            "catch(setup_call_catcher_cleanup(true, throw(boom), _, assertz(done(oops))), \
             boom, true), done(W)",
        )
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "W"), "oops");
}

#[test]
fn disjunction_and_if_then_else() {
    let mut env = engine();
    let solutions = env.query("(X = 1 ; X = 2), Y = X").expect("query");
    assert_eq!(solutions.len(), 2);
    assert_eq!(rendered(&env, &solutions[0], "Y"), "1");
    assert_eq!(rendered(&env, &solutions[1], "Y"), "2");

    let solution = env
        .query_once("(1 > 2 -> R = then ; R = else)")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "R"), "else");

    // Condition alternatives are discarded by the commit.
    let solutions = env
        .query("(member(X, [1,2,3]) -> true ; fail)")
        .expect("query");
    assert_eq!(solutions.len(), 1);

    // Bare if-then fails when the condition fails.
    assert!(env.query_once("(fail -> true)").expect("query").is_none());
}

#[test]
fn negation_as_failure() {
    let mut env = engine();
    assert!(env.query_once("\\+ fail").expect("query").is_some());
    assert!(env.query_once("\\+ true").expect("query").is_none());
    assert!(env
        .query_once("\\+ member(x, [a,b,c])")
        .expect("query")
        .is_some());
}

#[test]
fn meta_call_scopes_cut() {
    let mut env = engine();
    env.consult_str("q(1). q(2).").expect("consult");
    // The cut inside call/1 does not prune q/1's alternatives.
    let solutions = env.query("q(X), call((!, true))").expect("query");
    assert_eq!(solutions.len(), 2);
}

#[test]
fn uncaught_exception_surfaces_as_error() {
    let mut env = engine();
    match env.query_once("throw(my_ball)") {
        Err(RookError::Uncaught(ball)) => {
            assert_eq!(env.format_term(&ball), "my_ball");
        }
        other => panic!("expected uncaught exception, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn undefined_procedure_honours_unknown_flag() {
    let mut env = engine();
    match env.query_once("no_such_predicate(1)") {
        Err(RookError::Uncaught(ball)) => {
            let text = env.format_term(&ball);
            assert!(text.contains("existence_error"), "got {}", text);
        }
        other => panic!("expected existence error, got {:?}", other.map(|_| ())),
    }
    env.query_once("set_prolog_flag(unknown, fail)")
        .expect("flag set");
    assert!(env
        .query_once("no_such_predicate(1)")
        .expect("query")
        .is_none());
}

#[test]
fn halt_unwinds_without_killing_the_host() {
    let mut env = engine();
    let read = env.parse_goal("halt(3)").expect("parse");
    let handle = env.prepare(read.term).expect("prepare");
    assert_eq!(env.next(handle).expect("step"), Exec::Halt(3));
    assert_eq!(env.exit_code(), Some(3));
    // The engine accepts a fresh goal after the halt.
    assert!(env.query_once("true").expect("query").is_some());
}

#[test]
fn nested_goal_parks_and_resumes() {
    let mut env = engine();
    env.consult_str("n(1). n(2).").expect("consult");
    let outer = env.parse_goal("n(X)").expect("parse");
    let outer_handle = env.prepare(outer.term.clone()).expect("prepare");
    assert_eq!(env.next(outer_handle).expect("step"), Exec::Success);

    // Nested goal while the outer one is suspended.
    let inner = env.parse_goal("n(Y), Y = 2").expect("parse");
    let inner_handle = env.prepare(inner.term.clone()).expect("prepare");
    assert!(matches!(
        env.next(inner_handle).expect("step"),
        Exec::Success | Exec::SuccessLast
    ));
    env.stop(inner_handle).expect("stop inner");

    // The outer goal still backtracks into its second solution.
    assert!(matches!(
        env.next(outer_handle).expect("step"),
        Exec::Success | Exec::SuccessLast
    ));
    env.stop(outer_handle).expect("stop outer");
}

#[test]
fn dynamic_database_updates() {
    let mut env = engine();
    env.consult_str(":- dynamic(counter/1).\ncounter(0).")
        .expect("consult");
    env.query_once("retract(counter(0)), assertz(counter(1))")
        .expect("update")
        .expect("succeeds");
    let solution = env
        .query_once("counter(N)")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "N"), "1");

    // Abolish removes the predicate entirely.
    env.query_once("abolish(counter/1)").expect("abolish");
    match env.query_once("counter(_)") {
        Err(RookError::Uncaught(ball)) => {
            assert!(env.format_term(&ball).contains("existence_error"));
        }
        other => panic!("expected existence error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn strings_follow_double_quotes_flag() {
    let mut env = engine();
    let solution = env
        .query_once("X = \"ab\"")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "X"), "[97,98]");

    env.query_once("set_prolog_flag(double_quotes, chars)")
        .expect("flag");
    let solution = env
        .query_once("X = \"ab\"")
        .expect("query")
        .expect("solution");
    assert_eq!(rendered(&env, &solution, "X"), "[a,b]");
}

#[test]
fn operator_directive_changes_parsing() {
    let mut env = engine();
    env.consult_str(":- op(700, xfx, ===).\neq(X, Y) :- X === Y.\na === a.")
        .expect("consult");
    assert!(env.query_once("eq(a, a)").expect("query").is_some());
    assert!(env.query_once("eq(a, b)").expect("query").is_none());
}

#[test]
fn bagof_groups_by_witness() {
    let mut env = engine();
    env.consult_str("age(peter, 7). age(ann, 11). age(pat, 8). age(tom, 5).")
        .expect("consult");
    let solutions = env.query("bagof(Child, age(Child, Age), Bag)").expect("query");
    // One group per distinct age.
    assert_eq!(solutions.len(), 4);

    // Existential quantification collapses the groups.
    let solutions = env
        .query("bagof(Child, Age^age(Child, Age), Bag)")
        .expect("query");
    assert_eq!(solutions.len(), 1);
    assert_eq!(
        rendered(&env, &solutions[0], "Bag"),
        "[peter,ann,pat,tom]"
    );
}

#[test]
fn stream_round_trip_through_memory_sink() {
    let mut env = engine();
    let sink = env.streams().open_sink();
    let streams = env.streams();
    streams.set_current_output(sink);
    env.query_once("write(hello), nl, writeq('quoted atom')")
        .expect("write")
        .expect("succeeds");
    streams.set_current_output(2);
    let output = streams.take_output(sink).expect("collected");
    assert_eq!(output, "hello\n'quoted atom'");
}

#[test]
fn read_term_from_string_stream() {
    let mut env = engine();
    let id = env.streams().open_string("foo(Bar, 42). second.");
    let stream_term = env.streams().term_for(id);
    let goal = Term::compound(
        "read_term",
        vec![
            stream_term,
            Term::var(),
            Term::nil(),
        ],
    );
    assert!(env.run_once_term(&goal).expect("read"));
}
