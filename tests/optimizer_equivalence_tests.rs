//! Randomized semantic-equivalence checks for the optimizer.
//!
//! Random trees are evaluated through the predicate backend over random items
//! before and after rewriting; every pass alone and the composed loop must
//! agree with the unrewritten tree on every item.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tagsieve_core::expr::{CompareOp, Comparison, Expression, TagSet};
use tagsieve_exec::{Person, PredicateBackend, SearchItem};
use tagsieve_planner::optimizer::passes::default_passes;
use tagsieve_planner::{optimize, transform_up};

const TAGS: [&str; 5] = ["a", "b", "c", "d", "e"];

fn random_set(rng: &mut StdRng) -> TagSet {
    let n = rng.gen_range(0..3);
    (0..n).map(|_| TAGS[rng.gen_range(0..TAGS.len())].to_string()).collect()
}

fn random_leaf(rng: &mut StdRng) -> Expression {
    match rng.gen_range(0..7) {
        0 | 1 => Expression::Tag(random_set(rng)),
        2 => Expression::RejectedTag(random_set(rng)),
        3 => Expression::TypePrefix(["image/", "video/"][rng.gen_range(0..2)].to_string()),
        4 => Expression::NoPeople,
        5 => Expression::Copies(Comparison::new(CompareOp::Greater, rng.gen_range(0..3))),
        _ => Expression::Text(["x", "y"][rng.gen_range(0..2)].to_string()),
    }
}

fn random_expr(rng: &mut StdRng, depth: u32) -> Expression {
    if depth == 0 || rng.gen_bool(0.3) {
        return random_leaf(rng);
    }
    match rng.gen_range(0..3) {
        0 => Expression::not(random_expr(rng, depth - 1)),
        kind => {
            let n = rng.gen_range(0..4);
            let children = (0..n).map(|_| random_expr(rng, depth - 1)).collect();
            if kind == 1 {
                Expression::and(children)
            } else {
                Expression::or(children)
            }
        }
    }
}

fn random_item(rng: &mut StdRng, i: usize) -> SearchItem {
    let mut item = SearchItem::new(
        format!("{i:04x}"),
        ["image/png", "video/mp4", "text/plain"][rng.gen_range(0..3)],
        1024,
    );
    for tag in TAGS {
        match rng.gen_range(0..4) {
            0 => item.tags.insert(tag.to_string()),
            1 => item.rejected_tags.insert(tag.to_string()),
            _ => false,
        };
    }
    for _ in 0..rng.gen_range(0..3) {
        item.paths.push(format!("/{}/{i}", ["x", "y", "z"][rng.gen_range(0..3)]));
    }
    if rng.gen_bool(0.5) {
        item = item.with_person(Person {
            id: 1,
            name: "someone".into(),
            aliases: vec![],
        });
    }
    item
}

fn evaluations(backend: &PredicateBackend, e: &Expression, items: &[SearchItem]) -> Vec<bool> {
    let p = backend.compile(e).unwrap();
    items.iter().map(|item| p(item)).collect()
}

#[test]
fn composed_optimizer_preserves_semantics() {
    let mut rng = StdRng::seed_from_u64(0x7a65);
    let items: Vec<SearchItem> = (0..64).map(|i| random_item(&mut rng, i)).collect();
    let backend = PredicateBackend::new();

    for _ in 0..300 {
        let e = random_expr(&mut rng, 4);
        let optimized = optimize(e.clone());
        assert_eq!(
            evaluations(&backend, &e, &items),
            evaluations(&backend, &optimized, &items),
            "\n  before: {e}\n  after:  {optimized}"
        );
    }
}

#[test]
fn every_pass_preserves_semantics_on_its_own() {
    let mut rng = StdRng::seed_from_u64(42);
    let items: Vec<SearchItem> = (0..48).map(|i| random_item(&mut rng, i)).collect();
    let backend = PredicateBackend::new();

    for _ in 0..200 {
        let e = random_expr(&mut rng, 4);
        let expected = evaluations(&backend, &e, &items);
        for pass in default_passes() {
            if let Some(rewritten) = transform_up(&e, pass.as_ref()) {
                assert_eq!(
                    expected,
                    evaluations(&backend, &rewritten, &items),
                    "\n  pass:   {}\n  before: {e}\n  after:  {rewritten}",
                    pass.name()
                );
            }
        }
    }
}

#[test]
fn optimizing_twice_changes_nothing() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..300 {
        let once = optimize(random_expr(&mut rng, 5));
        assert_eq!(optimize(once.clone()), once);
    }
}
