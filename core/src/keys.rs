use std::{
    fs,
    path::{Path, PathBuf},
};

use backend::hal::layouts::{BatchParams, GaloisKeys, PublicKey, ReaderFrom, RelinKey, SecretKey, WriterTo};
use sampling::source::Source;
use tracing::info;

use crate::{
    error::{Error, Result},
    state::write_atomic,
    trait_families::KeyGenFamily,
};

pub const PARAMS_FILE: &str = "params";
pub const PUBLIC_KEY_FILE: &str = "public_key";
pub const SECRET_KEY_FILE: &str = "secret_key";
pub const RELIN_KEY_FILE: &str = "relin_key";
pub const GALOIS_KEY_FILE: &str = "galois_key";

/// Key material of the compute server: no secret key.
#[derive(Clone, Debug)]
pub struct EvaluationKeys {
    pub pk: PublicKey,
    pub rk: RelinKey,
    pub gk: GaloisKeys,
}

impl EvaluationKeys {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            pk: load_artifact(dir, PUBLIC_KEY_FILE)?,
            rk: load_artifact(dir, RELIN_KEY_FILE)?,
            gk: load_artifact(dir, GALOIS_KEY_FILE)?,
        })
    }
}

/// Key material of the key holder.
#[derive(Clone, Debug)]
pub struct ResolverKeys {
    pub sk: SecretKey,
    pub pk: PublicKey,
}

impl ResolverKeys {
    pub fn load(dir: &Path) -> Result<Self> {
        let sk: SecretKey = load_artifact(dir, SECRET_KEY_FILE)?;
        let pk: PublicKey = load_artifact(dir, PUBLIC_KEY_FILE)?;
        if sk.key_id() != pk.key_id() {
            return Err(Error::Setup(format!(
                "{}: secret and public key belong to different key pairs",
                dir.display()
            )));
        }
        Ok(Self { sk, pk })
    }
}

/// Everything produced by key setup.
#[derive(Clone, Debug)]
pub struct KeySet {
    pub params: BatchParams,
    pub sk: SecretKey,
    pub evaluation: EvaluationKeys,
}

impl KeySet {
    /// Secret, public and relinearization keys plus Galois keys for the
    /// `±2^i` row rotations.
    pub fn generate<M: KeyGenFamily>(module: &M, source: &mut Source) -> Result<Self> {
        let sk: SecretKey = module.generate_secret_key(source);
        let pk: PublicKey = module.generate_public_key(&sk, source)?;
        let rk: RelinKey = module.generate_relin_key(&sk, source)?;
        let gk: GaloisKeys =
            module.generate_galois_keys(&sk, &GaloisKeys::power_of_two_steps(module.row_size()), source)?;
        Ok(Self {
            params: *module.batch_params(),
            sk,
            evaluation: EvaluationKeys { pk, rk, gk },
        })
    }

    pub fn resolver_keys(&self) -> ResolverKeys {
        ResolverKeys {
            sk: self.sk.clone(),
            pk: self.evaluation.pk.clone(),
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|err| Error::Setup(format!("{}: {}", dir.display(), err)))?;
        save_artifact(dir, PARAMS_FILE, &self.params)?;
        save_artifact(dir, SECRET_KEY_FILE, &self.sk)?;
        save_artifact(dir, PUBLIC_KEY_FILE, &self.evaluation.pk)?;
        save_artifact(dir, RELIN_KEY_FILE, &self.evaluation.rk)?;
        save_artifact(dir, GALOIS_KEY_FILE, &self.evaluation.gk)?;
        info!(dir = %dir.display(), key_id = %format!("{:#018x}", self.sk.key_id()), "keys saved");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let params: BatchParams = load_params(dir)?;
        let resolver: ResolverKeys = ResolverKeys::load(dir)?;
        Ok(Self {
            params,
            sk: resolver.sk,
            evaluation: EvaluationKeys::load(dir)?,
        })
    }
}

pub fn load_params(dir: &Path) -> Result<BatchParams> {
    let params: BatchParams = load_artifact(dir, PARAMS_FILE)?;
    params
        .validate()
        .map_err(|err| Error::Setup(format!("{}: {}", dir.join(PARAMS_FILE).display(), err)))?;
    Ok(params)
}

fn save_artifact<T: WriterTo>(dir: &Path, name: &str, artifact: &T) -> Result<()> {
    let path: PathBuf = dir.join(name);
    write_atomic(&path, |writer| artifact.write_to(writer))
        .map_err(|err| Error::Setup(format!("{}: {}", path.display(), err)))
}

pub(crate) fn load_artifact<T: ReaderFrom + Default>(dir: &Path, name: &str) -> Result<T> {
    let path: PathBuf = dir.join(name);
    let bytes: Vec<u8> = fs::read(&path).map_err(|err| Error::Setup(format!("{}: {}", path.display(), err)))?;
    let mut artifact: T = T::default();
    let mut reader: &[u8] = &bytes;
    artifact
        .read_from(&mut reader)
        .map_err(|err| Error::Setup(format!("{}: {}", path.display(), err)))?;
    if !reader.is_empty() {
        return Err(Error::Setup(format!("{}: {} trailing bytes", path.display(), reader.len())));
    }
    Ok(artifact)
}
