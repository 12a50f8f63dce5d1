pub mod error;
pub mod hypothesis;
pub mod machine;
pub mod maximizer;
pub mod mcmc;
pub mod poisson;
pub mod prior;
pub mod systematics;

pub use error::{LikelihoodError, LikelihoodResult};
pub use hypothesis::{CompositeHypothesis, Limit, Priors, Translation, UnivariatePrior};
pub use machine::{
    LikelihoodMachine, LimitMethod, MaxLikelihood, PosteriorRatio, ToyOptions,
};
pub use maximizer::{Maximizer, Optimum};
pub use mcmc::{MetropolisSampler, Trace};
pub use prior::JeffreysPrior;
pub use systematics::Systematics;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::hypothesis::*;
    pub use crate::machine::*;
    pub use crate::maximizer::*;
    pub use crate::mcmc::*;
    pub use crate::prior::*;
    pub use crate::systematics::*;
}
