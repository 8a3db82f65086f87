use std::rc::Rc;

use reflow_core::prelude::*;
use reflow_directive::{Binding, Dom, FlowDirective, Modifiers, NodeInfo, Payload};

const CATALOG: &[&str] = &[
    "reactive",
    "reduce",
    "refcell",
    "reflow",
    "rust",
    "signal",
    "switch_map",
];

fn search(term: &str) -> Vec<&'static str> {
    if term.is_empty() {
        return Vec::new();
    }
    CATALOG
        .iter()
        .copied()
        .filter(|word| word.starts_with(term))
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let dom = Rc::new(Dom::new());
    let form = dom.create_element("form", None);
    let input = dom.create_element("input", Some(form));

    let typed = signal(Payload::Empty);
    let flow = FlowDirective::new(dom.clone());
    let binding = Binding::new(typed.clone(), "input")
        .with_modifiers(Modifiers::parse(["native", "extract", "stop"]));
    flow.mounted(input, &binding, NodeInfo::element());

    let term = concat_map(typed.clone(), |payload, _| {
        signal(payload.as_value().unwrap_or_default().trim().to_lowercase())
    });

    let results = switch_map(term.clone(), |term, projection| {
        log::info!("searching `{term}`");
        let results = signal(search(&term));
        projection.on_cleanup(move || log::info!("search for `{term}` superseded"));
        results
    });

    let _printer = watch_effect({
        let (term, results) = (term.clone(), results.clone());
        move || println!("{:>8} -> {:?}", term.get(), results.get())
    });

    for text in ["r", "re", "ref", "ref", "REF ", "x"] {
        dom.set_value(input, text);
        let outcome = dom.dispatch(input, "input");
        anyhow::ensure!(outcome.delivered == 1, "no flow listener for {text:?}");
    }

    flow.unmounted(input, &binding, NodeInfo::element());
    dom.set_value(input, "rust");
    dom.dispatch(input, "input");
    println!("after unmount: {:?}", results.get());

    Ok(())
}
