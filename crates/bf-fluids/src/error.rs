use thiserror::Error;

pub type FluidResult<T> = Result<T, FluidError>;

#[derive(Error, Debug)]
pub enum FluidError {
    #[error("Non-finite input for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Unknown property key: {key}")]
    UnknownProperty { key: String },

    #[error("Property {key} needs a second argument")]
    MissingArgument { key: String },
}
