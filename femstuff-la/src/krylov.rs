//! Preconditioned Krylov methods: conjugate gradients and BiCGSTAB.
//!
//! Both methods stop on the relative residual `||r|| <= tolerance * ||b||`, measured on the
//! residual the recurrence maintains.
use crate::csr::CsrView;
use crate::Real;
use core::fmt;
use log::debug;
use nalgebra::base::constraint::AreMultipliable;
use nalgebra::constraint::{DimEq, ShapeConstraint};
use nalgebra::storage::Storage;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Dim, Dyn, Matrix, Scalar, U1};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

/// Anything that computes `y = A x`.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>);
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T, R, C, S> LinearOperator<T> for Matrix<T, R, C, S>
where
    T: Real,
    R: Dim,
    C: Dim,
    S: Storage<T, R, C>,
    ShapeConstraint: DimEq<Dyn, R> + DimEq<C, Dyn> + AreMultipliable<R, C, Dyn, U1>,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        y.gemv(T::one(), self, &x, T::zero());
    }
}

impl<T: Real> LinearOperator<T> for CsrMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
    }
}

impl<'a, T: Real> LinearOperator<T> for CsrView<'a, T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        assert_eq!(y.len(), self.nrows());
        assert_eq!(x.len(), self.ncols());
        for i in 0..self.nrows() {
            let (cols, vals) = self.row(i);
            y[i] = cols
                .iter()
                .zip(vals)
                .fold(T::zero(), |acc, (&j, &a_ij)| acc + a_ij * x[j]);
        }
    }
}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        y.copy_from(&x);
    }
}

/// Triangle of a square matrix, diagonal included.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Triangle {
    Lower,
    Upper,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KrylovSettings<T> {
    pub max_iterations: usize,
    /// Relative residual tolerance.
    pub tolerance: T,
}

impl Default for KrylovSettings<f64> {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KrylovOutput<T> {
    /// Number of updates made to the (initial) solution vector.
    pub num_iterations: usize,
    /// `||r|| / ||b||` of the last residual.
    pub relative_residual: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KrylovErrorKind {
    IndefiniteOperator,
    IndefinitePreconditioner,
    /// A recurrence coefficient vanished or became non-finite.
    Breakdown,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for KrylovErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite."),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner."),
            Self::Breakdown => write!(f, "Breakdown of the Krylov recurrence."),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

#[derive(Debug)]
pub struct KrylovError<T> {
    pub output: KrylovOutput<T>,
    pub kind: KrylovErrorKind,
}

impl<T> fmt::Display for KrylovError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Krylov solve failed after {} iterations. Error: {}",
            self.output.num_iterations, self.kind
        )
    }
}

impl<T: fmt::Debug> Error for KrylovError<T> {}

fn relative_residual<T: Real>(r: &DVector<T>, b_norm: T) -> T {
    r.norm() / b_norm
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
struct CgWorkspace<T: Scalar> {
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    Ap: DVector<T>,
}

impl<T: Real> CgWorkspace<T> {
    fn new() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }

    fn resize(&mut self, dim: usize) {
        for buffer in [&mut self.r, &mut self.z, &mut self.p, &mut self.Ap] {
            buffer.resize_vertically_mut(dim, T::zero());
        }
    }
}

/// Preconditioned conjugate gradients for symmetric positive definite operators.
///
/// The solver keeps its buffers between solves, so reusing one instance for a sequence of
/// systems of equal size does not allocate.
#[derive(Debug, Clone)]
pub struct ConjugateGradient<T: Scalar> {
    workspace: CgWorkspace<T>,
    settings: KrylovSettings<T>,
}

impl<T: Real> ConjugateGradient<T> {
    pub fn new(settings: KrylovSettings<T>) -> Self {
        Self {
            workspace: CgWorkspace::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &KrylovSettings<T> {
        &self.settings
    }

    #[allow(non_snake_case)]
    pub fn solve_with_guess<'b>(
        &mut self,
        a: &impl LinearOperator<T>,
        preconditioner: &impl LinearOperator<T>,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<KrylovOutput<T>, KrylovError<T>> {
        use KrylovErrorKind::*;
        let b = b.into();
        let mut x = x.into();
        assert_eq!(b.len(), x.len());

        let mut output = KrylovOutput {
            num_iterations: 0,
            relative_residual: T::zero(),
        };

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        self.workspace.resize(x.len());
        let CgWorkspace { r, z, p, Ap } = &mut self.workspace;

        // r = b - Ax
        a.apply((&mut *r).into(), (&x).into());
        r.zip_apply(&b, |Ax_i, b_i| *Ax_i = b_i - *Ax_i);

        // z = Pr
        preconditioner.apply((&mut *z).into(), (&*r).into());
        p.copy_from(&*z);
        let mut zTr = z.dot(&*r);

        loop {
            output.relative_residual = relative_residual(r, b_norm);
            if output.relative_residual <= self.settings.tolerance {
                break;
            } else if !output.relative_residual.is_finite() {
                return Err(KrylovError { output, kind: Breakdown });
            } else if output.num_iterations >= self.settings.max_iterations {
                let max_iter = self.settings.max_iterations;
                return Err(KrylovError {
                    output,
                    kind: MaxIterationsReached { max_iter },
                });
            }

            // Ap = A * p
            a.apply((&mut *Ap).into(), (&*p).into());
            let pAp = p.dot(&*Ap);

            if pAp <= T::zero() {
                return Err(KrylovError {
                    output,
                    kind: IndefiniteOperator,
                });
            }
            if zTr <= T::zero() {
                return Err(KrylovError {
                    output,
                    kind: IndefinitePreconditioner,
                });
            }

            let alpha = zTr / pAp;
            x.zip_apply(&*p, |x_i, p_i| *x_i += alpha * p_i);
            r.zip_apply(&*Ap, |r_i, Ap_i| *r_i -= alpha * Ap_i);
            output.num_iterations += 1;

            // z <- P r
            preconditioner.apply((&mut *z).into(), (&*r).into());
            let zTr_next = z.dot(&*r);
            let beta = zTr_next / zTr;

            // p <- z + beta * p
            p.zip_apply(&*z, |p_i, z_i| *p_i = z_i + beta * *p_i);
            zTr = zTr_next;
        }

        debug!(
            "CG converged after {} iterations (relative residual {}).",
            output.num_iterations, output.relative_residual
        );
        Ok(output)
    }
}

#[derive(Debug, Clone)]
struct BiCgStabWorkspace<T: Scalar> {
    r: DVector<T>,
    r_hat: DVector<T>,
    p: DVector<T>,
    v: DVector<T>,
    y: DVector<T>,
    s: DVector<T>,
    z: DVector<T>,
    t: DVector<T>,
}

impl<T: Real> BiCgStabWorkspace<T> {
    fn new() -> Self {
        Self {
            r: DVector::zeros(0),
            r_hat: DVector::zeros(0),
            p: DVector::zeros(0),
            v: DVector::zeros(0),
            y: DVector::zeros(0),
            s: DVector::zeros(0),
            z: DVector::zeros(0),
            t: DVector::zeros(0),
        }
    }

    fn resize(&mut self, dim: usize) {
        for buffer in [
            &mut self.r,
            &mut self.r_hat,
            &mut self.p,
            &mut self.v,
            &mut self.y,
            &mut self.s,
            &mut self.z,
            &mut self.t,
        ] {
            buffer.resize_vertically_mut(dim, T::zero());
        }
    }
}

/// Right-preconditioned stabilized bi-conjugate gradients for general square operators.
#[derive(Debug, Clone)]
pub struct BiCgStab<T: Scalar> {
    workspace: BiCgStabWorkspace<T>,
    settings: KrylovSettings<T>,
}

impl<T: Real> BiCgStab<T> {
    pub fn new(settings: KrylovSettings<T>) -> Self {
        Self {
            workspace: BiCgStabWorkspace::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &KrylovSettings<T> {
        &self.settings
    }

    pub fn solve_with_guess<'b>(
        &mut self,
        a: &impl LinearOperator<T>,
        preconditioner: &impl LinearOperator<T>,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<KrylovOutput<T>, KrylovError<T>> {
        use KrylovErrorKind::*;
        let b = b.into();
        let mut x = x.into();
        assert_eq!(b.len(), x.len());

        let mut output = KrylovOutput {
            num_iterations: 0,
            relative_residual: T::zero(),
        };

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        self.workspace.resize(x.len());
        let BiCgStabWorkspace {
            r,
            r_hat,
            p,
            v,
            y,
            s,
            z,
            t,
        } = &mut self.workspace;

        // r = b - Ax
        a.apply((&mut *r).into(), (&x).into());
        r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - *ax_i);
        r_hat.copy_from(&*r);
        p.fill(T::zero());
        v.fill(T::zero());

        let mut rho = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();

        loop {
            output.relative_residual = relative_residual(r, b_norm);
            if output.relative_residual <= self.settings.tolerance {
                break;
            } else if !output.relative_residual.is_finite() {
                return Err(KrylovError { output, kind: Breakdown });
            } else if output.num_iterations >= self.settings.max_iterations {
                let max_iter = self.settings.max_iterations;
                return Err(KrylovError {
                    output,
                    kind: MaxIterationsReached { max_iter },
                });
            }

            let rho_next = r_hat.dot(&*r);
            if rho_next == T::zero() || omega == T::zero() {
                return Err(KrylovError { output, kind: Breakdown });
            }
            let beta = (rho_next / rho) * (alpha / omega);
            rho = rho_next;

            // p <- r + beta * (p - omega * v)
            p.zip_zip_apply(&*r, &*v, |p_i, r_i, v_i| *p_i = r_i + beta * (*p_i - omega * v_i));

            // y = M p, v = A y
            preconditioner.apply((&mut *y).into(), (&*p).into());
            a.apply((&mut *v).into(), (&*y).into());

            let r_hat_v = r_hat.dot(&*v);
            if r_hat_v == T::zero() {
                return Err(KrylovError { output, kind: Breakdown });
            }
            alpha = rho / r_hat_v;

            // s = r - alpha * v
            s.copy_from(&*r);
            s.axpy(-alpha, &*v, T::one());

            if relative_residual(s, b_norm) <= self.settings.tolerance {
                x.axpy(alpha, &*y, T::one());
                r.copy_from(&*s);
                output.num_iterations += 1;
                continue;
            }

            // z = M s, t = A z
            preconditioner.apply((&mut *z).into(), (&*s).into());
            a.apply((&mut *t).into(), (&*z).into());

            let t_t = t.dot(&*t);
            omega = if t_t > T::zero() { t.dot(&*s) / t_t } else { T::zero() };

            // x <- x + alpha * y + omega * z
            x.axpy(alpha, &*y, T::one());
            x.axpy(omega, &*z, T::one());

            // r <- s - omega * t
            r.copy_from(&*s);
            r.axpy(-omega, &*t, T::one());
            output.num_iterations += 1;
        }

        debug!(
            "BiCGSTAB converged after {} iterations (relative residual {}).",
            output.num_iterations, output.relative_residual
        );
        Ok(output)
    }
}
