//! Minimal local stand-in for the `env_param` crate (not available in this
//! build's registry). Mirrors the API and behavior of the upstream
//! `EnvParam<T>`: a lazily-initialized parameter read from an environment
//! variable, falling back to a default value on first access.

use std::str::FromStr;
use std::sync::OnceLock;

pub struct EnvParam<T> {
    value: OnceLock<T>,
    env: &'static str,
    default: &'static str,
}

impl<T> EnvParam<T> {
    pub const fn new(env: &'static str, default: &'static str) -> EnvParam<T> {
        EnvParam {
            value: OnceLock::new(),
            env,
            default,
        }
    }
}

impl<T: FromStr> EnvParam<T> {
    fn read_default(&self) -> T {
        match T::from_str(self.default) {
            Ok(v) => v,
            Err(_) => {
                eprintln!(
                    "[env_param] ERROR {}: could not parse the default value \"{}\".",
                    self.env, self.default
                );
                panic!("[env_param] {}: invalid default value \"{}\".", self.env, self.default)
            }
        }
    }

    pub fn get(&self) -> T
    where
        T: Copy,
    {
        *self.get_ref()
    }

    pub fn get_ref(&self) -> &T {
        let read = || match std::env::var(self.env) {
            Result::Ok(param) => match T::from_str(&param) {
                Result::Ok(value) => value,
                Result::Err(_) => {
                    eprintln!("[env_param] WARNING: could not parse the value \"{}\" for environment variable \"{}\". Using default: \"{}\" ", &param, self.env, self.default);
                    self.read_default()
                }
            },
            Result::Err(std::env::VarError::NotPresent) => self.read_default(),
            Result::Err(err) => {
                eprintln!(
                    "[env_param] {}: {}. Using default: \"{}\" ",
                    self.env, err, self.default
                );
                self.read_default()
            }
        };
        self.value.get_or_init(read)
    }

    pub fn set(&self, value: T) {
        if self.value.set(value).is_err() {
            panic!(
                "Parameter {} is already initialized (i.e. was previously accessed).",
                self.env
            );
        }
    }
}
