// Coverage for `codegen::generate`/`context::render`/`render_choice` — the
// parts of the pipeline the other integration tests never reach because they
// stop at projectability's accept/reject verdict.

use mixchor::ast::{GlobalType, Protocol};
use mixchor::{codegen, dfa, normalize, projectability, projection};

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn msg(from: &str, to: &str, label: &str, cont: GlobalType) -> GlobalType {
    GlobalType::msg(from, to, label, vec![], cont)
}

fn project(protocol: &Protocol) -> mixchor::error::Result<projection::Projections> {
    let normalised = normalize::normalize(&protocol.body);
    let normalised = Protocol::new(protocol.name.clone(), protocol.roles.clone(), normalised);
    let raw = projection::project(&normalised);
    projectability::resolve_all(&protocol.name, &protocol.roles, &raw)
}

#[test]
fn same_peer_receive_branches_fold_into_one_select_arm() {
    // `A` is the sole leader: it sends `yes` or `no` to `B`. `B`'s
    // projection is `MChoice([?A.yes;end, ?A.no;end])` — both branches
    // receive from the same peer, so `render_choice` must fold them into one
    // `rx_a.recv()` arm rather than emitting two arms that each try to
    // borrow `rx_a` mutably inside the same `select!` block.
    let body = GlobalType::Choice(vec![
        msg("A", "B", "yes", GlobalType::End),
        msg("A", "B", "no", GlobalType::End),
    ]);
    let protocol = Protocol::new("TwoLeaderReceive", roles(&["A", "B"]), body);

    let resolved = project(&protocol).expect("A is the sole leader, so this must be accepted");

    let mut minimised = resolved.clone();
    for (role, lt) in resolved.iter() {
        minimised.insert(role.clone(), dfa::minimise(role, lt).unwrap());
    }

    let files = codegen::generate(&protocol.name, &minimised).expect("generation must succeed");
    let b_role = files
        .iter()
        .find(|f| f.relative_path == "roles/b.rs")
        .expect("B's role file must be generated");

    let recv_arms = b_role.contents.matches("rx_a.recv()").count();
    assert_eq!(
        recv_arms, 1,
        "expected exactly one rx_a.recv() arm, found {recv_arms} in:\n{}",
        b_role.contents
    );
    assert!(
        b_role.contents.contains("match msg {"),
        "the merged arm must dispatch on the message variant"
    );
}

#[test]
fn generated_tree_has_all_five_sibling_directories() {
    let body = msg("A", "B", "ping", GlobalType::End);
    let protocol = Protocol::new("Sibling", roles(&["A", "B"]), body);
    let resolved = project(&protocol).unwrap();

    let files = codegen::generate(&protocol.name, &resolved).unwrap();
    let dirs_present = |dir: &str| files.iter().any(|f| f.relative_path.starts_with(&format!("{dir}/")));

    for dir in ["roles", "messages", "callbacks", "results", "channels"] {
        assert!(dirs_present(dir), "missing generated `{dir}/` directory");
    }
    assert!(files.iter().any(|f| f.relative_path == "mod.rs"));
}

#[test]
fn end_state_returns_the_role_done_callback() {
    let body = msg("A", "B", "ping", GlobalType::End);
    let protocol = Protocol::new("Done", roles(&["A", "B"]), body);
    let resolved = project(&protocol).unwrap();

    let files = codegen::generate(&protocol.name, &resolved).unwrap();
    let a_role = files.iter().find(|f| f.relative_path == "roles/a.rs").unwrap();
    assert!(a_role.contents.contains("return Ok(callbacks.on_done());"));

    let a_callbacks = files.iter().find(|f| f.relative_path == "callbacks/a.rs").unwrap();
    assert!(a_callbacks.contents.contains("fn on_done"));

    let a_results = files.iter().find(|f| f.relative_path == "results/a.rs").unwrap();
    assert!(a_results.contents.contains("ADone"));
}
