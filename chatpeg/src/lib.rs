pub mod errors;
pub mod message;
pub mod regex_partial;

pub mod peg {
    pub mod arena;
    pub mod eval;
    pub mod gbnf_gen;
}

pub mod json_partial;
pub mod schema;
pub mod ast;

pub mod mappers {
    pub mod native;
    pub mod constructed;
    pub mod short_form;
    pub mod generic;
    pub mod oai_array;
    pub mod command_r7b;
    pub mod function_gemma;

    pub use command_r7b::map_command_r7b;
    pub use constructed::map_constructed;
    pub use function_gemma::map_function_gemma;
    pub use generic::map_generic;
    pub use native::map_native;
    pub use oai_array::map_oai_array;
    pub use short_form::map_short_form;
}

pub mod dispatcher;
pub mod streaming;

pub mod formats {
    pub mod deepseek_r1;
    pub mod generic_format;
    pub mod glm45;
    pub mod gpt_oss;
    pub mod hermes2pro;
}

pub use ast::{AstArena, AstNode, ChatTag};
pub use dispatcher::{dispatch, Dispatcher, DispatcherConfig, FormatDescriptor};
pub use message::{ChatMessage, Tool, ToolCall};
pub use peg::arena::{ExprId, PegArena, PegBuilder, RuleId};
pub use peg::eval::{evaluate, ParseOutcome};
pub use streaming::{Delta, StreamingSession};

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init_test_tracing() {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::TRACE)
                .with_test_writer()
                .try_init()
                .ok();
        });
    }
}
