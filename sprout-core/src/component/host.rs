//! Host node collection
//!
//! Rendering pushes host nodes into whichever children collection is ambient.
//! A container binds a fresh collection for its children's render, gathers
//! what they emitted, and emits itself into the enclosing collection. The
//! runtime never inspects the nodes.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::rc::Rc;

use crate::dynamic::DynamicContext;
use crate::error::{ReactiveError, Result};

type Collection = Rc<RefCell<Vec<Box<dyn Any>>>>;

thread_local! {
    static CHILDREN: DynamicContext<Option<Collection>> = const { DynamicContext::new(None) };
}

/// Render `body` with a fresh children collection and return what it emitted.
pub fn collect_children<N: 'static>(body: impl FnOnce() -> Result<()>) -> Result<Vec<N>> {
    let collection = Collection::default();
    CHILDREN.with(|children| children.bind(Some(Rc::clone(&collection)), body))?;

    let nodes = collection.take();
    nodes
        .into_iter()
        .map(|node| {
            node.downcast::<N>()
                .map(|node| *node)
                .map_err(|_| ReactiveError::HostNodeMismatch {
                    expected: type_name::<N>(),
                })
        })
        .collect()
}

/// Push `node` into the innermost children collection.
pub fn emit_child<N: 'static>(node: N) -> Result<()> {
    let collection = CHILDREN
        .with(|children| children.read())
        .ok_or(ReactiveError::NoChildCollector)?;
    collection.borrow_mut().push(Box::new(node));
    Ok(())
}

/// Whether a children collection is bound.
pub fn is_collecting() -> bool {
    CHILDREN.with(|children| children.read().is_some())
}
