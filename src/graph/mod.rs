//! Node trees
//!
//! Leaves wrap plugins; `Chain` runs its children one after another and
//! `Mix` runs them side by side. Both containers, and the effects-only
//! `Pedalboard`, can be edited while other threads are processing them.

mod chain;
pub(crate) mod leaf;
pub(crate) mod mix;
pub(crate) mod node;
mod pedalboard;

pub use chain::Chain;
pub use mix::Mix;
pub use node::{Node, NodeId};
pub use pedalboard::Pedalboard;

/// List-like container operations shared by `Chain`, `Mix` and `Pedalboard`
///
/// Every edit takes only the container's structural lock, so it never
/// waits for processing to finish; running calls see the edit at their
/// next chunk.
macro_rules! impl_container {
    ($ty:ident) => {
        impl $ty {
            /// Handle to the underlying node
            pub fn as_node(&self) -> &$crate::graph::Node {
                &self.node
            }

            pub fn id(&self) -> $crate::graph::NodeId {
                self.node.id()
            }

            /// Number of direct children
            pub fn len(&self) -> usize {
                self.node.child_count()
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Child at `index`
            pub fn get(&self, index: usize) -> $crate::error::Result<$crate::graph::Node> {
                self.node.child_at(index)
            }

            /// Replace the child at `index`, returning the old one
            pub fn set(
                &self,
                index: usize,
                node: impl Into<$crate::graph::Node>,
            ) -> $crate::error::Result<$crate::graph::Node> {
                self.node.set_child(index, node.into())
            }

            /// Insert a child before `index` (`index == len` appends)
            pub fn insert(
                &self,
                index: usize,
                node: impl Into<$crate::graph::Node>,
            ) -> $crate::error::Result<()> {
                self.node.insert_child(index, node.into())
            }

            /// Add a child at the end
            pub fn append(&self, node: impl Into<$crate::graph::Node>) -> $crate::error::Result<()> {
                self.node.append_child(node.into())
            }

            /// Alias for [`append`](Self::append)
            pub fn push(&self, node: impl Into<$crate::graph::Node>) -> $crate::error::Result<()> {
                self.append(node)
            }

            /// Remove and return the child at `index`
            pub fn remove(&self, index: usize) -> $crate::error::Result<$crate::graph::Node> {
                self.node.remove_child(index)
            }

            /// Remove every child
            pub fn clear(&self) -> $crate::error::Result<()> {
                self.node.clear_children()
            }

            /// Snapshot of the children
            pub fn nodes(&self) -> Vec<$crate::graph::Node> {
                self.node.children()
            }

            /// True if `node` is this container or appears anywhere below it
            pub fn contains(&self, node: &$crate::graph::Node) -> bool {
                self.node.contains(node)
            }

            pub fn latency_samples(&self) -> $crate::error::Result<usize> {
                self.node.latency_samples()
            }

            pub fn reset(&self) -> $crate::error::Result<()> {
                self.node.reset()
            }
        }

        impl From<$ty> for $crate::graph::Node {
            fn from(container: $ty) -> Self {
                container.node
            }
        }

        impl From<&$ty> for $crate::graph::Node {
            fn from(container: &$ty) -> Self {
                container.node.clone()
            }
        }

        impl AsRef<$crate::graph::Node> for $ty {
            fn as_ref(&self) -> &$crate::graph::Node {
                &self.node
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.node, f)
            }
        }
    };
}

pub(crate) use impl_container;

/// Build a [`Chain`] from nodes, containers or anything else convertible
/// into a [`Node`]
///
/// ```
/// use pedalchain::{chain, Delay, Gain, Plugin};
///
/// let chain = chain![Gain::new(-3.0).into_node(), Delay::new(32).into_node()];
/// assert_eq!(chain.len(), 2);
/// ```
#[macro_export]
macro_rules! chain {
    () => {
        $crate::Chain::new(::std::vec::Vec::new())
    };
    ($($node:expr),+ $(,)?) => {
        $crate::Chain::new(::std::vec![$($crate::Node::from($node)),+])
    };
}

/// Build a [`Mix`] from nodes, containers or anything else convertible
/// into a [`Node`]
#[macro_export]
macro_rules! mix {
    () => {
        $crate::Mix::new(::std::vec::Vec::new())
    };
    ($($node:expr),+ $(,)?) => {
        $crate::Mix::new(::std::vec![$($crate::Node::from($node)),+])
    };
}

macro_rules! impl_tuple_mix {
    ($($name:ident),+) => {
        /// A tuple of nodes composes in parallel
        impl<$($name: Into<Node>),+> From<($($name,)+)> for Node {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Mix::new(vec![$($name.into()),+]).into()
            }
        }
    };
}

impl_tuple_mix!(A, B);
impl_tuple_mix!(A, B, C);
impl_tuple_mix!(A, B, C, D);
