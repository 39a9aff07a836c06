//! Request generators: the first step of every processing stage.
//!
//! A generator turns the previous stage's success value into the request of
//! the next stage. Any `FnOnce(P) -> anyhow::Result<Request>` is one; the
//! helpers below cover the constant, override and transform-chain cases.

use recordkit_core::{Request, RequestOverride};

/// Builds the request of a stage from the previous stage's value.
pub trait RequestGenerator<P>: Send {
    /// # Errors
    ///
    /// A failure becomes the stage failure (`RequestError::Generator`).
    fn generate(self, previous: P) -> anyhow::Result<Request>;
}

impl<P, F> RequestGenerator<P> for F
where
    F: FnOnce(P) -> anyhow::Result<Request> + Send,
{
    fn generate(self, previous: P) -> anyhow::Result<Request> {
        self(previous)
    }
}

/// One step of a [`transformed`] generator.
pub type Transform<P> = Box<dyn FnOnce(Request, &P) -> anyhow::Result<Request> + Send>;

/// Ignores the previous value and yields `request`.
pub fn just<P>(request: Request) -> impl RequestGenerator<P> {
    move |_previous: P| Ok(request)
}

/// Yields `base` with `overrides` applied in order, re-validated.
pub fn overriding<P>(base: Request, overrides: Vec<RequestOverride>) -> impl RequestGenerator<P> {
    move |_previous: P| Ok(base.with_overrides(overrides)?)
}

/// Threads `base` through `transforms` in order. Each transform sees the
/// previous stage's value; the first failure aborts the chain.
pub fn transformed<P>(base: Request, transforms: Vec<Transform<P>>) -> impl RequestGenerator<P> {
    move |previous: P| {
        transforms
            .into_iter()
            .try_fold(base, |request, transform| transform(request, &previous))
    }
}

#[cfg(test)]
mod tests {
    use recordkit_core::{Operation, Predicate, Record, ValidationError};

    use super::*;

    fn fetch() -> Request {
        Request::builder()
            .operation(Operation::Fetch)
            .entity("dummy")
            .build()
            .unwrap()
    }

    #[test]
    fn just_ignores_previous() {
        let request = just::<u32>(fetch()).generate(7).unwrap();
        assert_eq!(request, fetch());
    }

    #[test]
    fn closures_see_previous_value() {
        let generator = |limit: usize| -> anyhow::Result<Request> {
            Ok(fetch().to_builder().fetch_limit(limit).build()?)
        };
        assert_eq!(generator.generate(12).unwrap().fetch_limit(), Some(12));
    }

    #[test]
    fn overriding_turns_fetch_into_batch_delete() {
        let generator = overriding::<()>(
            fetch().with_override(RequestOverride::Predicate(Some(Predicate::eq("rank", 3_i64)))).unwrap(),
            vec![RequestOverride::Operation(Operation::BatchDelete)],
        );
        let request = generator.generate(()).unwrap();
        assert_eq!(request.operation(), Operation::BatchDelete);
        assert_eq!(request.predicate(), Some(&Predicate::eq("rank", 3_i64)));
    }

    #[test]
    fn overriding_revalidates() {
        let err = overriding::<()>(fetch(), vec![RequestOverride::Operation(Operation::Upsert)])
            .generate(())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::MissingField("payload"))
        );
    }

    #[test]
    fn transforms_run_in_order_with_previous() {
        let transforms: Vec<Transform<Vec<Record>>> = vec![
            Box::new(|request, records| {
                Ok(request
                    .with_override(RequestOverride::Payload(records.clone()))?
                    .with_override(RequestOverride::Operation(Operation::Save))?)
            }),
            Box::new(|request, _| Ok(request.with_override(RequestOverride::Retries(3))?)),
        ];
        let request = transformed(fetch(), transforms)
            .generate(vec![Record::new("dummy", "a")])
            .unwrap();
        assert_eq!(request.operation(), Operation::Save);
        assert_eq!(request.payload().len(), 1);
        assert_eq!(request.retries(), 3);
    }

    #[test]
    fn transform_failure_stops_the_chain() {
        let transforms: Vec<Transform<()>> = vec![
            Box::new(|_, _| anyhow::bail!("no session")),
            Box::new(|_, _| panic!("must not run")),
        ];
        let err = transformed(fetch(), transforms).generate(()).unwrap_err();
        assert_eq!(err.to_string(), "no session");
    }
}
