mod label_and_text;
mod text_input;

pub(crate) use label_and_text::{
    label_and_bool,
    label_and_text,
};
pub(crate) use text_input::TextInput;
