//! Chain: serial composition
//!
//! Each chunk runs through the children in order; whatever a child
//! produces (any number of frames) is what the next child receives.

use super::impl_container;
use super::node::Node;
use crate::engine::{self, AudioBuffer};
use crate::error::Result;

/// Ordered list of nodes processed one after another
///
/// Latency is the sum of the children's latencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chain {
    node: Node,
}

impl Chain {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            node: Node::chain_with("Chain", nodes, false),
        }
    }

    /// Run audio through the chain; see [`engine::process`]
    pub fn process(
        &self,
        input: &AudioBuffer,
        sample_rate: f64,
        buffer_size: Option<usize>,
        reset: bool,
    ) -> Result<AudioBuffer> {
        engine::process(&self.node, input, sample_rate, buffer_size, reset)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl_container!(Chain);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Delay, Gain, Plugin, SineSynth};
    use crate::error::PedalError;

    #[test]
    fn test_list_operations() {
        let chain = Chain::default();
        let a = Gain::new(-1.0).into_node();
        let b = Gain::new(-2.0).into_node();
        let c = Gain::new(-3.0).into_node();

        chain.append(a.clone()).unwrap();
        chain.push(c.clone()).unwrap();
        chain.insert(1, b.clone()).unwrap();
        assert_eq!(chain.nodes(), vec![a.clone(), b.clone(), c.clone()]);

        let old = chain.set(0, c.clone()).unwrap();
        assert_eq!(old, a);
        assert_eq!(chain.remove(1).unwrap(), b);
        assert_eq!(chain.len(), 2);

        chain.clear().unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_index_errors() {
        let chain = Chain::default();
        assert!(matches!(
            chain.get(0),
            Err(PedalError::IndexOutOfRange { index: 0, len: 0 })
        ));
        assert!(chain.insert(2, Gain::new(0.0).into_node()).is_err());
        assert!(chain.remove(0).is_err());
    }

    #[test]
    fn test_rejects_cycles() {
        let outer = Chain::default();
        let inner = Chain::default();
        outer.append(&inner).unwrap();

        assert!(matches!(
            inner.append(&outer),
            Err(PedalError::CyclicComposition { .. })
        ));
        assert!(matches!(
            outer.append(&outer),
            Err(PedalError::CyclicComposition { .. })
        ));
    }

    #[test]
    fn test_latency_is_additive() {
        let chain = Chain::new(vec![Delay::new(10).into_node(), Delay::new(20).into_node()]);
        assert_eq!(chain.latency_samples().unwrap(), 30);
    }

    #[test]
    fn test_plain_chain_may_hold_instruments() {
        let chain = Chain::default();
        chain.append(SineSynth::new().into_node()).unwrap();
        assert!(chain.as_node().is_instrument());
    }
}
