//! Record collectors and output fan-out.
//!
//! Every fragment output port resolves to one `Downstream`:
//! - no consumer: `Discard`
//! - one consumer: `Direct`, the consumer sees the live record
//! - several consumers: `Broadcast`, every consumer but the last receives a
//!   copy held in one scratch record; the last receives the live record

use std::cell::RefCell;
use std::rc::Rc;

use stagec_core::types::Record;

use crate::traits::OpError;

pub trait Collector {
    fn add(&mut self, record: &mut Record) -> Result<(), OpError>;
}

/// Shared handle to a consumer. Tasks are single-threaded, hence `Rc`.
pub type CollectorRef = Rc<RefCell<dyn Collector>>;

/// Buffers every record it receives. Tasks hand these out as sink outputs.
impl Collector for Vec<Record> {
    fn add(&mut self, record: &mut Record) -> Result<(), OpError> {
        self.push(record.clone());
        Ok(())
    }
}

pub enum Downstream {
    Discard,
    Direct(CollectorRef),
    Broadcast {
        targets: Vec<CollectorRef>,
        scratch: Record,
    },
}

impl Downstream {
    /// Pick the fan-out strategy for `targets`.
    pub fn of(mut targets: Vec<CollectorRef>) -> Self {
        match targets.len() {
            0 => Downstream::Discard,
            1 => match targets.pop() {
                Some(only) => Downstream::Direct(only),
                None => Downstream::Discard,
            },
            _ => Downstream::Broadcast {
                targets,
                scratch: Record::default(),
            },
        }
    }

    pub fn fan_out(&self) -> usize {
        match self {
            Downstream::Discard => 0,
            Downstream::Direct(_) => 1,
            Downstream::Broadcast { targets, .. } => targets.len(),
        }
    }
}

impl Collector for Downstream {
    fn add(&mut self, record: &mut Record) -> Result<(), OpError> {
        match self {
            Downstream::Discard => Ok(()),
            Downstream::Direct(target) => deliver(target, record),
            Downstream::Broadcast { targets, scratch } => {
                let Some((last, rest)) = targets.split_last() else {
                    return Ok(());
                };
                for target in rest {
                    scratch.copy_from(record);
                    deliver(target, scratch)?;
                }
                deliver(last, record)
            }
        }
    }
}

fn deliver(target: &CollectorRef, record: &mut Record) -> Result<(), OpError> {
    let mut consumer = target
        .try_borrow_mut()
        .map_err(|_| OpError::Exec("collector re-entered while delivering".into()))?;
    consumer.add(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagec_core::types::Scalar;

    struct Mutating(Rc<RefCell<Vec<Record>>>);

    impl Collector for Mutating {
        fn add(&mut self, record: &mut Record) -> Result<(), OpError> {
            self.0.borrow_mut().push(record.clone());
            record.values[0] = Scalar::I32(-1);
            Ok(())
        }
    }

    #[test]
    fn broadcast_isolates_consumers() {
        let seen: Vec<Rc<RefCell<Vec<Record>>>> =
            (0..3).map(|_| Rc::new(RefCell::new(Vec::new()))).collect();
        let targets: Vec<CollectorRef> = seen
            .iter()
            .map(|s| Rc::new(RefCell::new(Mutating(Rc::clone(s)))) as CollectorRef)
            .collect();
        let mut out = Downstream::of(targets);
        assert_eq!(out.fan_out(), 3);

        let mut record = Record::new(vec![Scalar::I32(7), Scalar::Str("x".into())]);
        out.add(&mut record).unwrap();

        for s in &seen {
            assert_eq!(s.borrow()[0].values[0], Scalar::I32(7));
        }
        // Only the last consumer saw the live record.
        assert_eq!(record.values[0], Scalar::I32(-1));
    }

    #[test]
    fn discard_and_direct() {
        let mut none = Downstream::of(Vec::new());
        assert_eq!(none.fan_out(), 0);
        none.add(&mut Record::default()).unwrap();

        let buf = Rc::new(RefCell::new(Vec::<Record>::new()));
        let mut one = Downstream::of(vec![buf.clone() as CollectorRef]);
        assert_eq!(one.fan_out(), 1);
        one.add(&mut Record::new(vec![Scalar::Bool(true)])).unwrap();
        assert_eq!(buf.borrow().len(), 1);
    }
}
