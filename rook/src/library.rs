//! The bootstrap library: list and control predicates defined in Prolog
//! itself, consulted at engine construction and sealed against user
//! modification.

/// Prelude source, kept deliberately small; everything here is plain ISO
/// Prolog resolved by the engine like user code.
pub const PRELUDE: &str = r#"
member(X, [X|_]).
member(X, [_|T]) :- member(X, T).

append([], L, L).
append([H|T], L, [H|R]) :- append(T, L, R).

select(X, [X|T], T).
select(X, [H|T], [H|R]) :- select(X, T, R).

reverse(L, R) :- reverse_(L, [], R).
reverse_([], Acc, Acc).
reverse_([H|T], Acc, R) :- reverse_(T, [H|Acc], R).

last([X], X) :- !.
last([_|T], X) :- last(T, X).

nth0(N, L, E) :- nth_(L, 0, N, E).
nth1(N, L, E) :- nth_(L, 1, N, E).
nth_([H|_], B, B, H).
nth_([_|T], B, N, E) :- B1 is B + 1, nth_(T, B1, N, E).

maplist(_, []).
maplist(G, [X|Xs]) :- call(G, X), maplist(G, Xs).

maplist(_, [], []).
maplist(G, [X|Xs], [Y|Ys]) :- call(G, X, Y), maplist(G, Xs, Ys).

sum_list([], 0).
sum_list([H|T], S) :- sum_list(T, S0), S is S0 + H.

memberchk(X, L) :- member(X, L), !.
"#;

/// Predicate keys defined by the prelude; sealed after loading.
pub fn prelude_keys() -> Vec<(&'static str, usize)> {
    vec![
        ("member", 2),
        ("append", 3),
        ("select", 3),
        ("reverse", 2),
        ("reverse_", 3),
        ("last", 2),
        ("nth0", 3),
        ("nth1", 3),
        ("nth_", 4),
        ("maplist", 2),
        ("maplist", 3),
        ("sum_list", 2),
        ("memberchk", 2),
    ]
}
