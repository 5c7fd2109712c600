//! DCG rewriting: `H --> B` grammar rules become ordinary clauses
//! threading a difference list, applied by the loader before clauses
//! enter the database.

use crate::error::{instantiation_error, type_error, Ball};
use crate::term::Term;

/// Add the two difference-list arguments to a non-terminal.
pub fn extend_nonterminal(nt: &Term, s0: Term, s: Term) -> Result<Term, Ball> {
    match nt.deref() {
        Term::Atom(a) => Ok(Term::compound(a.name(), vec![s0, s])),
        Term::Struct(structure) => {
            let mut args = structure.args.clone();
            args.push(s0);
            args.push(s);
            Ok(Term::compound(structure.functor.name().name(), args))
        }
        Term::Var(_) => Err(instantiation_error()),
        other => Err(type_error("callable", &other)),
    }
}

/// Translate a grammar-rule body between the list states `s0` and `s`.
fn translate_body(body: &Term, s0: Term, s: Term) -> Result<Term, Ball> {
    let b = body.deref();
    // An unbound body defers to phrase/3 at run time.
    if matches!(b, Term::Var(_)) {
        return Ok(Term::compound("phrase", vec![b, s0, s]));
    }
    if b.is_nil() {
        return Ok(Term::compound("=", vec![s0, s]));
    }
    if b.is_atom_named("!") {
        return Ok(Term::compound(
            ",",
            vec![Term::atom("!"), Term::compound("=", vec![s0, s])],
        ));
    }
    if let Some(parts) = b.match_struct(",", 2) {
        let mid = Term::var();
        let left = translate_body(&parts[0], s0, mid.clone())?;
        let right = translate_body(&parts[1], mid, s)?;
        return Ok(Term::compound(",", vec![left, right]));
    }
    if let Some(parts) = b.match_struct(";", 2) {
        let left = translate_body(&parts[0], s0.clone(), s.clone())?;
        let right = translate_body(&parts[1], s0, s)?;
        return Ok(Term::compound(";", vec![left, right]));
    }
    if let Some(parts) = b.match_struct("->", 2) {
        let mid = Term::var();
        let left = translate_body(&parts[0], s0, mid.clone())?;
        let right = translate_body(&parts[1], mid, s)?;
        return Ok(Term::compound("->", vec![left, right]));
    }
    if let Some(parts) = b.match_struct("\\+", 1) {
        let negated = translate_body(&parts[0], s0.clone(), Term::var())?;
        return Ok(Term::compound(
            ",",
            vec![
                Term::compound("\\+", vec![negated]),
                Term::compound("=", vec![s0, s]),
            ],
        ));
    }
    if let Some(parts) = b.match_struct("{}", 1) {
        return Ok(Term::compound(
            ",",
            vec![parts[0].clone(), Term::compound("=", vec![s0, s])],
        ));
    }
    // Terminal list: S0 = [t1,…,tk|S].
    if b.match_struct(".", 2).is_some() {
        return match b.list_view() {
            Ok(terminals) => {
                let consumed = Term::partial_list(terminals, s);
                Ok(Term::compound("=", vec![s0, consumed]))
            }
            Err(_) => Err(type_error("list", &b)),
        };
    }
    // Plain non-terminal call.
    extend_nonterminal(&b, s0, s)
}

/// Rewrite `Head --> Body` into `(Head', Body')` ready for the database.
pub fn transform_rule(head: &Term, body: &Term) -> Result<(Term, Term), Ball> {
    let s0 = Term::var();
    let s = Term::var();
    let new_head = extend_nonterminal(head, s0.clone(), s.clone())?;
    let new_body = translate_body(body, s0, s)?;
    Ok((new_head, new_body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_unifies_states() {
        // as --> [].
        let (head, body) = transform_rule(&Term::atom("as"), &Term::nil()).unwrap();
        assert!(head.match_struct("as", 2).is_some());
        assert!(body.match_struct("=", 2).is_some());
    }

    #[test]
    fn terminals_consume_the_list() {
        // as --> [a], as.
        let rule_body = Term::compound(
            ",",
            vec![Term::list(vec![Term::atom("a")]), Term::atom("as")],
        );
        let (head, body) = transform_rule(&Term::atom("as"), &rule_body).unwrap();
        assert!(head.match_struct("as", 2).is_some());
        let parts = body.match_struct(",", 2).expect("conjunction");
        // Left half: S0 = [a|Mid].
        let eq = parts[0].match_struct("=", 2).expect("consumption");
        let cons = eq[1].match_struct(".", 2).expect("cons cell");
        assert!(cons[0].is_atom_named("a"));
        // Right half: as(Mid, S).
        assert!(parts[1].match_struct("as", 2).is_some());
    }

    #[test]
    fn curly_goals_do_not_consume() {
        let rule_body = Term::compound("{}", vec![Term::compound(">", vec![Term::var(), Term::int(0)])]);
        let (_, body) = transform_rule(&Term::atom("check"), &rule_body).unwrap();
        let parts = body.match_struct(",", 2).expect("conjunction");
        assert!(parts[0].match_struct(">", 2).is_some());
        assert!(parts[1].match_struct("=", 2).is_some());
    }

    #[test]
    fn cut_passes_through() {
        let (_, body) = transform_rule(&Term::atom("p"), &Term::atom("!")).unwrap();
        let parts = body.match_struct(",", 2).expect("conjunction");
        assert!(parts[0].is_atom_named("!"));
    }

    #[test]
    fn nonterminals_gain_two_arguments() {
        let nt = Term::compound("digit", vec![Term::var()]);
        let extended = extend_nonterminal(&nt, Term::var(), Term::var()).unwrap();
        assert!(extended.match_struct("digit", 3).is_some());
    }
}
