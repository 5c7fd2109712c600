//! Type-testing builtins: `var/1`, `atom/1`, `number/1`, …

use crate::builtins::{BuiltinExec, Registry};
use crate::term::Term;

fn holds(result: bool) -> Result<BuiltinExec, crate::error::Ball> {
    Ok(BuiltinExec::Det(result))
}

pub(super) fn register(reg: &mut Registry) {
    reg.add("var", 1, |_, _, a| {
        holds(matches!(a[0].deref(), Term::Var(_)))
    });
    reg.add("nonvar", 1, |_, _, a| {
        holds(!matches!(a[0].deref(), Term::Var(_)))
    });
    reg.add("atom", 1, |_, _, a| {
        holds(matches!(a[0].deref(), Term::Atom(_)))
    });
    reg.add("number", 1, |_, _, a| holds(a[0].deref().is_number()));
    reg.add("integer", 1, |_, _, a| {
        holds(matches!(a[0].deref(), Term::Int(_))
            || matches!(a[0].deref(), Term::Dec(d) if d.is_integral()))
    });
    reg.add("float", 1, |_, _, a| {
        holds(matches!(a[0].deref(), Term::Float(_)))
    });
    reg.add("atomic", 1, |_, _, a| holds(a[0].deref().is_atomic()));
    reg.add("compound", 1, |_, _, a| {
        holds(matches!(a[0].deref(), Term::Struct(_)))
    });
    reg.add("callable", 1, |_, _, a| holds(a[0].deref().is_callable()));
    reg.add("is_list", 1, |_, _, a| holds(a[0].list_view().is_ok()));
    reg.add("ground", 1, |_, _, a| {
        holds(crate::term::renew::term_variables(&a[0]).is_empty())
    });
}
