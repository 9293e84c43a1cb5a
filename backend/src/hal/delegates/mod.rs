mod encoding;
mod encryption;
mod evaluation;
mod keys;
mod module;
