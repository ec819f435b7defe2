use paste::paste;

use crate::{
    error::Result,
    event::Event,
    input::InputStream,
    message::{Layer, Message, MessageBus},
};

macro_rules! parser_trait {
    ($($layer:ident),* $(,)?) => {
        paste! {
            /// The capability set every scanner layer exposes.
            ///
            /// A layer owns its parent chain down to the raw stack scanner,
            /// so any layer can serve as the public face of its stack:
            /// push input sources, subscribe handlers at any layer at or
            /// below it, and drive the whole stack to completion.
            pub trait AbstractParser {
                /// The message slot shared by this layer's stack.
                fn message_bus(&self) -> &MessageBus;

                /// Drives the pipeline until the terminal end-of-input event
                /// or the first error. Events already broadcast before an
                /// error are permanent; no rollback is attempted.
                fn run(&mut self) -> Result<()>;

                /// Sends a control message down the layer chain.
                #[inline]
                fn message_send(&self, message: Message) -> Result<()> {
                    self.message_bus().send(message)
                }

                /// Pushes a named input source onto the raw stack. The
                /// source pushed last is read first; a source pushed while
                /// others wait below it behaves like an included file.
                #[inline]
                fn push_input_stream(&self, name: &str, stream: InputStream) -> Result<()> {
                    self.message_send(Message::PushInputStream {
                        name: name.to_owned(),
                        stream,
                    })
                }

                $(
                    #[doc = concat!(
                        "Subscribes `handler` to the `",
                        stringify!($layer),
                        "` event stream.",
                    )]
                    ///
                    /// Fails with `UnhandledMessage` when that layer is not
                    /// part of this stack.
                    #[inline]
                    fn [<subscribe_ $layer:snake>]<F>(&self, handler: F) -> Result<()>
                    where
                        F: FnMut(&Event) -> Result<()> + 'static,
                    {
                        self.message_send(Message::Subscribe {
                            layer: Layer::$layer,
                            handler: Box::new(handler),
                        })
                    }
                )*
            }
        }
    };
}

parser_trait! {
    RawStackScanner,
    RawFileLineOverrideFilter,
    LineWrapFilter,
    CommentScanner,
    CommentFilter,
    NewlinePreservingWhitespaceFilter,
    PreprocessorScanner,
}
