//! Upward control messages and the chain that delivers them.
//!
//! Events flow up the layer stack; control flows down through [`Message`]s.
//! A stack carries a single [`MessageBus`], created by the bottom layer. Each
//! layer interposes its own handler at construction, saving the previous one:
//! a handler consumes the message kinds addressed to its layer and forwards
//! everything else to the saved handler. A message nobody consumes reaches
//! the bottom and reports [`Error::UnhandledMessage`].

use std::{
    cell::RefCell,
    fmt::{self, Debug, Formatter},
    mem,
    rc::Rc,
};

use crate::{
    error::{Error, Result},
    input::InputStream,
    reactor::EventHandler,
};

/// The layers a subscriber can address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    RawStackScanner,
    RawFileLineOverrideFilter,
    LineWrapFilter,
    CommentScanner,
    CommentFilter,
    NewlinePreservingWhitespaceFilter,
    PreprocessorScanner,
}

/// A control message sent down the layer stack.
pub enum Message {
    /// Registers `handler` with the reactor of the addressed layer.
    Subscribe {
        layer: Layer,
        handler: EventHandler,
    },
    /// Pushes a named input source onto the raw stack scanner. The new source
    /// is read before the remainder of any source below it.
    PushInputStream {
        name: String,
        stream: InputStream,
    },
    /// Remaps subsequent cursors, as directed by a `#line` directive. A
    /// missing file retains the current one; `line` numbers the next source
    /// line.
    FileLineOverride {
        file: Option<String>,
        line: i32,
    },
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Message::Subscribe { layer, .. } => {
                f.debug_struct("Subscribe").field("layer", layer).finish()
            }
            Message::PushInputStream { name, .. } => f
                .debug_struct("PushInputStream")
                .field("name", name)
                .finish(),
            Message::FileLineOverride { file, line } => f
                .debug_struct("FileLineOverride")
                .field("file", file)
                .field("line", line)
                .finish(),
        }
    }
}

/// A message handler: consume the message or delegate to the saved parent.
pub type MessageHandler = Box<dyn FnMut(Message) -> Result<()>>;

/// The single message slot of a layer stack.
///
/// Cheap to clone; clones share the slot. The slot always holds the
/// outermost handler, so a send enters at the top of the chain regardless of
/// which layer's handle it goes through.
#[derive(Clone)]
pub struct MessageBus {
    slot: Rc<RefCell<MessageHandler>>,
}

impl MessageBus {
    /// Creates a bus whose innermost handler is `root` (the bottom layer's).
    pub fn new(root: MessageHandler) -> Self {
        MessageBus {
            slot: Rc::new(RefCell::new(root)),
        }
    }

    /// Delivers a message to the chain, entering at the outermost handler.
    pub fn send(&self, message: Message) -> Result<()> {
        (self.slot.borrow_mut())(message)
    }

    /// Interposes a new handler: `wrap` receives the current outermost
    /// handler and returns the replacement, which typically consumes its own
    /// message kinds and delegates the rest to the handler it was given.
    pub fn interpose(&self, wrap: impl FnOnce(MessageHandler) -> MessageHandler) {
        let mut slot = self.slot.borrow_mut();
        let previous = mem::replace(&mut *slot, Box::new(|_| Err(Error::UnhandledMessage)));
        *slot = wrap(previous);
    }
}
