use std::ops::ControlFlow;

use arbitrary::Unstructured;
use arbtest::{arbitrary, arbtest};
use thingy_vector::{TransientVector, Vector};

#[derive(arbitrary::Arbitrary, Debug)]
enum Op {
    Append(u32),
    Pop,
    Update(usize, u32),
    Extend(Vec<u32>),
    Clone,
}

impl Op {
    fn apply_to_vec(&self, vec: &mut Vec<u32>) {
        match self {
            Op::Append(x) => vec.push(*x),
            Op::Pop => {
                vec.pop();
            }
            Op::Update(idx, x) => {
                let i = idx % (vec.len() + 1);
                if let Some(place) = vec.get_mut(i) {
                    *place = *x;
                } else {
                    vec.push(*x);
                }
            }
            Op::Extend(xs) => vec.extend_from_slice(xs),
            Op::Clone => {}
        }
    }

    fn apply_to_vector(&self, vec: &mut Vector<u32>, arena: &mut Vec<(Vector<u32>, Vec<u32>)>) {
        match self {
            Op::Append(x) => *vec = vec.append(*x),
            Op::Pop => {
                if !vec.is_empty() {
                    *vec = vec.pop().unwrap();
                }
            }
            Op::Update(idx, x) => *vec = vec.update(idx % (vec.len() + 1), *x).unwrap(),
            Op::Extend(xs) => {
                for x in xs {
                    *vec = vec.append(*x);
                }
            }
            Op::Clone => {
                arena.push((vec.clone(), vec.iter().copied().collect()));
            }
        }
    }

    fn apply_to_transient(&self, vec: &mut TransientVector<u32>) {
        match self {
            Op::Append(x) => {
                vec.append(*x).unwrap();
            }
            Op::Pop => {
                if !vec.is_empty().unwrap() {
                    vec.pop().unwrap();
                }
            }
            Op::Update(idx, x) => {
                let len = vec.len().unwrap();
                vec.update(idx % (len + 1), *x).unwrap();
            }
            Op::Extend(xs) => {
                vec.extend_from(xs.iter().copied()).unwrap();
            }
            Op::Clone => {}
        }
    }
}

// u.arbitrary() generates very short vecs by default:
// https://github.com/matklad/arbtest/issues/8
fn arb_vec(u: &mut Unstructured<'_>) -> arbitrary::Result<Vec<u32>> {
    let len = u.arbitrary_len::<u32>()?;
    std::iter::from_fn(|| Some(u.arbitrary::<u32>()))
        .take(len)
        .collect()
}

#[test]
fn mutations() {
    arbtest(|u| {
        let mut vec: Vec<u32> = arb_vec(u)?;
        let mut vector: Vector<u32> = vec.iter().copied().collect();
        let mut arena = Vec::new();
        let ops: Vec<Op> = u.arbitrary()?;

        for op in ops {
            op.apply_to_vec(&mut vec);
            op.apply_to_vector(&mut vector, &mut arena);

            vector.check_invariants();

            assert_eq!(vec, vector.iter().cloned().collect::<Vec<_>>());
        }

        // Old versions are unaffected by everything that came after them.
        for (old, contents) in &arena {
            old.check_invariants();
            assert_eq!(contents, &old.iter().cloned().collect::<Vec<_>>());
        }

        Ok(())
    });
}

#[test]
fn transient_mutations() {
    arbtest(|u| {
        let mut vec: Vec<u32> = arb_vec(u)?;
        let original: Vector<u32> = vec.iter().copied().collect();
        let snapshot = vec.clone();
        let mut transient = original.begin_edit();
        let ops: Vec<Op> = u.arbitrary()?;

        for op in ops {
            op.apply_to_vec(&mut vec);
            op.apply_to_transient(&mut transient);
            assert_eq!(transient.len().unwrap(), vec.len());
        }

        let vector = transient.end_edit().unwrap();
        vector.check_invariants();
        assert_eq!(vec, vector.iter().cloned().collect::<Vec<_>>());

        original.check_invariants();
        assert_eq!(snapshot, original.iter().cloned().collect::<Vec<_>>());

        Ok(())
    });
}

#[test]
fn slice_from() {
    arbtest(|u| {
        let mut vec: Vec<u32> = arb_vec(u)?;
        let vector: Vector<u32> = vec.iter().copied().collect();
        let idx = u.arbitrary::<usize>()? % (vec.len() + 1);

        let result: Vec<u32> = vector
            .slice_from(idx)
            .map(|seq| seq.iter().copied().collect())
            .unwrap_or_default();
        let claimed_len = vector.iter_from(idx).len();
        vec.drain(..idx);
        assert_eq!(result, vec);
        assert_eq!(claimed_len, vec.len());

        Ok(())
    });
}

#[test]
fn skip_matches_rest() {
    arbtest(|u| {
        let vec: Vec<u32> = arb_vec(u)?;
        let vector: Vector<u32> = vec.iter().copied().collect();
        let Some(seq) = vector.seq() else {
            return Ok(());
        };
        let n = u.arbitrary::<usize>()? % (vec.len() + 1);

        let mut walked = Some(seq);
        for _ in 0..n {
            walked = walked.and_then(|s| s.rest());
        }
        let skipped = seq.skip(n);
        assert_eq!(walked.map(|s| s.index()), skipped.map(|s| s.index()));
        assert_eq!(skipped.map(|s| *s.first()), vec.get(n).copied());

        Ok(())
    });
}

#[test]
fn fold_stops_early() {
    arbtest(|u| {
        let vec: Vec<u32> = arb_vec(u)?;
        let vector: Vector<u32> = vec.iter().copied().collect();
        let limit = u.arbitrary::<usize>()? % (vec.len() + 1);

        let mut visited = 0;
        let taken = vector.fold(Vec::new(), |mut acc, x| {
            visited += 1;
            acc.push(*x);
            if acc.len() == limit {
                ControlFlow::Break(acc)
            } else {
                ControlFlow::Continue(acc)
            }
        });
        let expected = if limit == 0 { vec.len() } else { limit };
        assert_eq!(visited, expected);
        assert_eq!(taken, vec[..expected]);

        Ok(())
    });
}

#[test]
fn bulk_construction_agrees() {
    arbtest(|u| {
        let vec: Vec<u32> = arb_vec(u)?;
        let collected: Vector<u32> = vec.iter().copied().collect();
        let sliced = Vector::from(vec.as_slice());
        collected.check_invariants();
        sliced.check_invariants();
        assert_eq!(collected, sliced);
        assert_eq!(collected.shift(), sliced.shift());

        Ok(())
    });
}
