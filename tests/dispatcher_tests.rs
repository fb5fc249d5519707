use statewire::observability::DumpWriter;
use statewire::{
    Action, Binder, BoxError, Dispatcher, Event, Handler, Rule, State, StateKey, StateTable,
};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn recorder(log: &Log, name: &'static str) -> Handler<(), String> {
    let log = Rc::clone(log);
    Handler::new(move |_: &()| {
        log.borrow_mut().push(name.to_string());
        Ok(name.to_string())
    })
    .named(name)
}

fn gate_keeper(log: &Log) -> Dispatcher<(), String> {
    let table = StateTable::new(
        [
            (
                "Locked",
                vec![
                    ("coin", Rule::to("Unlocked", recorder(log, "unlock"))),
                    ("pass", Rule::to("Locked", recorder(log, "buzz"))),
                ],
            ),
            (
                "Unlocked",
                vec![
                    ("coin", Rule::to("Unlocked", recorder(log, "thank"))),
                    ("pass", Rule::to("Locked", recorder(log, "lock"))),
                ],
            ),
        ],
        Some(State::from("Locked")),
    )
    .unwrap();
    Dispatcher::new(table)
}

fn state(d: &Dispatcher<(), String>) -> String {
    d.current_state().map(|s| s.to_string()).unwrap_or_default()
}

#[test]
fn unbound_events_are_ignored() {
    let log = Log::default();
    let gate = gate_keeper(&log);

    for from in ["Locked", "Unlocked", "Nowhere"] {
        gate.set_current(from);
        assert_eq!(gate.fire("kick").unwrap(), None);
        assert_eq!(state(&gate), from);
    }
    assert!(log.borrow().is_empty());
}

#[test]
fn rule_commits_target_and_returns_action_value() {
    let log = Log::default();
    let gate = gate_keeper(&log);

    assert_eq!(gate.fire("coin").unwrap().as_deref(), Some("unlock"));
    assert_eq!(state(&gate), "Unlocked");
    assert_eq!(gate.previous_state(), Some(State::from("Locked")));
}

#[test]
fn failing_action_leaves_state_unchanged() {
    let gate: Dispatcher<(), String> = Dispatcher::default();
    gate.update([(
        "Locked",
        vec![(
            "coin",
            Rule::to("Unlocked", Handler::new(|_: &()| Err::<String, BoxError>("coin jammed".into()))),
        )],
    )]);

    let err = gate.fire("coin").unwrap_err();
    assert_eq!(err.to_string(), "coin jammed");
    assert_eq!(state(&gate), "Locked");
}

#[test]
fn bind_is_visible_to_the_next_dispatch() {
    let log = Log::default();
    let gate = gate_keeper(&log);

    gate.bind("Locked", "coin", Rule::to("Locked", recorder(&log, "refuse")));
    assert_eq!(gate.fire("coin").unwrap().as_deref(), Some("refuse"));
    assert_eq!(state(&gate), "Locked");
}

#[test]
fn update_touches_only_mentioned_entries() {
    let log = Log::default();
    let gate = gate_keeper(&log);
    let locked = StateKey::from("Locked");
    let coin = Event::from("coin");

    let before = gate.snapshot();
    gate.update([("Locked", vec![("coin", Rule::to("Locked", recorder(&log, "refuse")))])]);
    let after = gate.snapshot();

    assert_eq!(before.without(&locked, &coin), after.without(&locked, &coin));
    assert_ne!(before.rule(&locked, &coin), after.rule(&locked, &coin));
    assert_eq!(after.rule(&locked, &coin).and_then(|r| r.target.clone()), Some(State::from("Locked")));
}

#[test]
fn gate_keeper_sequence() {
    let log = Log::default();
    let gate = gate_keeper(&log);

    let mut trace = Vec::new();
    for event in ["pass", "coin", "coin", "pass"] {
        gate.fire(event).unwrap();
        trace.push(state(&gate));
    }

    assert_eq!(trace, vec!["Locked", "Unlocked", "Unlocked", "Locked"]);
    assert_eq!(*log.borrow(), vec!["buzz", "unlock", "thank", "lock"]);
}

#[test]
fn outer_commit_wins_over_nested_dispatch() {
    let d: Dispatcher = Dispatcher::default();
    d.update([
        (
            "S0",
            vec![
                (
                    "A",
                    Rule::to(
                        "S1",
                        Handler::with_dispatcher(|d: &Dispatcher, _: &()| {
                            d.fire("B")?;
                            assert_eq!(d.current_state(), Some(State::from("S2")));
                            Ok(())
                        }),
                    ),
                ),
                ("B", Rule::transition("S2")),
            ],
        ),
        ("S1", vec![]),
        ("S2", vec![]),
    ]);

    d.fire("A").unwrap();
    assert_eq!(d.current_state(), Some(State::from("S1")));
}

#[test]
fn nested_dispatch_sees_outer_state_before_commit() {
    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let d: Dispatcher = Dispatcher::default();
    d.bind(
        "Idle",
        "start",
        Rule::to(
            "Running",
            Handler::with_dispatcher(move |d: &Dispatcher, _: &()| {
                *sink.borrow_mut() = d.current_state();
                Ok(())
            }),
        ),
    );

    d.fire("start").unwrap();
    assert_eq!(*seen.borrow(), Some(State::from("Idle")));
}

#[test]
fn any_state_binding_fires_everywhere_without_moving() {
    let log = Log::default();
    let gate = gate_keeper(&log);
    gate.bind_any("page_shown", Rule::stay(recorder(&log, "shown")));

    for from in ["Locked", "Unlocked", "Nowhere"] {
        gate.set_current(from);
        assert_eq!(gate.fire("page_shown").unwrap().as_deref(), Some("shown"));
        assert_eq!(state(&gate), from);
    }
    assert_eq!(log.borrow().len(), 3);
}

#[test]
fn any_state_binding_with_target_moves_the_machine() {
    let log = Log::default();
    let gate = gate_keeper(&log);
    gate.bind_any("reset", Rule::transition("Locked"));

    gate.set_current("Unlocked");
    gate.fire("reset").unwrap();
    assert_eq!(state(&gate), "Locked");
}

#[test]
fn exact_state_rule_beats_any_state_rule() {
    let log = Log::default();
    let gate = gate_keeper(&log);
    gate.bind_any("coin", Rule::stay(recorder(&log, "global")));

    assert_eq!(gate.fire("coin").unwrap().as_deref(), Some("unlock"));
    gate.set_current("Nowhere");
    assert_eq!(gate.fire("coin").unwrap().as_deref(), Some("unlock"));
}

#[test]
fn any_state_rule_applies_when_fallback_is_disabled() {
    let log = Log::default();
    let gate = gate_keeper(&log).with_default_fallback(false);
    gate.bind_any("coin", Rule::stay(recorder(&log, "global")));

    gate.set_current("Nowhere");
    assert_eq!(gate.fire("coin").unwrap().as_deref(), Some("global"));
    assert_eq!(state(&gate), "Nowhere");
}

#[test]
fn unmapped_event_uses_default_state_rule() {
    let d: Dispatcher = Dispatcher::new(
        StateTable::new(
            [
                ("Home", vec![("help", Rule::transition("Home"))]),
                ("Away", vec![("back", Rule::transition("Home"))]),
            ],
            Some(State::from("Home")),
        )
        .unwrap(),
    );

    d.set_current("Away");
    d.fire("help").unwrap();
    assert_eq!(d.current_state(), Some(State::from("Home")));
}

#[test]
fn per_state_default_beats_default_state_fallback() {
    let log = Log::default();
    let gate = gate_keeper(&log);
    gate.bind("Unlocked", statewire::ANY_EVENT, Rule::stay(recorder(&log, "local")));

    gate.set_current("Unlocked");
    gate.fire("kick").unwrap();
    gate.bind("Locked", "kick", Rule::stay(recorder(&log, "default")));
    gate.fire("kick").unwrap();
    assert_eq!(*log.borrow(), vec!["local", "local"]);
}

#[test]
fn wildcard_event_keys() {
    let log = Log::default();
    let d: Dispatcher<(), String> = Dispatcher::default();
    d.update([(
        "Normal",
        vec![
            ("*button* pressed", Rule::stay(recorder(&log, "mouse"))),
            ("[0-9] pressed", Rule::stay(recorder(&log, "digit"))),
            ("* pressed", Rule::stay(recorder(&log, "key"))),
            ("enter pressed", Rule::to("Insert", recorder(&log, "enter"))),
        ],
    )]);

    assert_eq!(d.fire("Lbutton pressed").unwrap().as_deref(), Some("mouse"));
    assert_eq!(d.fire("7 pressed").unwrap().as_deref(), Some("digit"));
    assert_eq!(d.fire("a pressed").unwrap().as_deref(), Some("key"));
    assert_eq!(d.fire("a released").unwrap(), None);
    assert_eq!(d.fire("enter pressed").unwrap().as_deref(), Some("enter"));
    assert_eq!(state(&d), "Insert");
}

#[test]
fn doubled_star_key_matches_like_single_star() {
    let log = Log::default();
    let d: Dispatcher<(), String> = Dispatcher::default();
    d.bind("S", "**pressed", Rule::stay(recorder(&log, "hit")));

    assert_eq!(d.fire("a pressed").unwrap().as_deref(), Some("hit"));
    assert_eq!(d.fire("a released").unwrap(), None);
}

#[test]
fn per_state_default_event() {
    let log = Log::default();
    let d: Dispatcher<(), String> = Dispatcher::default();
    d.update([("Modal", vec![(statewire::ANY_EVENT, Rule::to("Modal", recorder(&log, "swallow")))])]);

    assert_eq!(d.fire("anything").unwrap().as_deref(), Some("swallow"));
}

#[test]
fn payload_reaches_every_handler_in_the_chain() {
    let total = Rc::new(RefCell::new(0));
    let (a, b) = (Rc::clone(&total), Rc::clone(&total));
    let d: Dispatcher<i32, i32> = Dispatcher::default();
    d.bind(
        "Idle",
        "add",
        Rule::stay(Action::chain([
            Handler::new(move |n: &i32| {
                *a.borrow_mut() += n;
                Ok(*n)
            }),
            Handler::new(move |n: &i32| {
                *b.borrow_mut() += n;
                Ok(n * 2)
            }),
        ])),
    );

    assert_eq!(d.dispatch("add", &5).unwrap(), Some(10));
    assert_eq!(*total.borrow(), 10);
}

#[test]
fn failures_are_written_to_the_dump() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.jsonl");
    let d: Dispatcher = Dispatcher::default().with_dump(DumpWriter::new(&path));
    d.bind(
        "Idle",
        "explode",
        Rule::to("Gone", Handler::new(|_: &()| Err::<(), BoxError>("boom".into())).named("detonate")),
    );

    assert!(d.fire("explode").is_err());

    let contents = std::fs::read_to_string(&path).unwrap();
    let report: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(report["event"], "explode");
    assert_eq!(report["from"], "Idle");
    assert_eq!(report["state"], "Idle");
    assert_eq!(report["actions"][0], "detonate");
    assert_eq!(report["error"], "boom");
}

#[test]
fn from_config_rejects_unknown_default_state() {
    let config = statewire::Config {
        default_state: Some("Open".to_string()),
        ..Default::default()
    };
    let result: statewire::Result<Dispatcher> =
        Dispatcher::from_config([("Locked", vec![("coin", Rule::transition("Locked"))])], &config);
    assert!(matches!(result, Err(statewire::StatewireError::Config(_))));
}

#[test]
fn snapshot_serializes_to_json() {
    let log = Log::default();
    let gate = gate_keeper(&log);
    let json = gate.snapshot().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["default_state"], "Locked");
    assert_eq!(value["states"][0]["state"], "Locked");
    assert_eq!(value["states"][0]["rules"][0]["event"], "coin");
    assert_eq!(value["states"][0]["rules"][0]["actions"][0]["name"], "unlock");
}
