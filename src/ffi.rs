//! C API over the solver layer.
//!
//! Every entry point returns 0 on success and 1 on failure, writing the
//! failure text into a caller-supplied buffer of at least
//! [`RSBE_MAX_ERROR_LENGTH`] bytes. Output arrays are allocated with
//! `malloc` by the callee and released through the matching `rsbe_free_*`
//! function; all frees accept NULL. Output pointers are nulled before any
//! fallible work, so a failed call never leaves dangling outputs.

use crate::repr::{DomIndex, Table, VarLabel};
use crate::solver::{self, Heuristic, MarginalEntry};
use crate::{Error, Result};
use libc::{c_char, c_double, c_int, c_longlong, size_t};
use rand::Rng;
use std::sync::Arc;

/// Required capacity of error-message buffers, terminator included.
#[no_mangle]
pub static RSBE_MAX_ERROR_LENGTH: c_int = 200;

pub const RSBE_HEURISTIC_MIN_DEG: c_int = 0;
pub const RSBE_HEURISTIC_W_MIN_DEG: c_int = 1;
pub const RSBE_HEURISTIC_MIN_FILL: c_int = 2;
pub const RSBE_HEURISTIC_W_MIN_FILL: c_int = 3;

/// One input factor table. `values` holds `dom_sizes[0] * dom_sizes[1] * ...`
/// entries with the first scope variable varying fastest.
#[repr(C)]
pub struct TableEntry {
    pub num_vars: c_int,
    /// variable indices, strictly increasing
    pub vars: *const c_int,
    pub dom_sizes: *const c_int,
    pub values: *const c_double,
}

/// One marginal distribution over one or two variables.
#[repr(C)]
pub struct Marginal {
    pub vars_len: c_int,
    pub vars: *mut c_int,
    pub values_len: c_int,
    pub values: *mut c_double,
}

fn write_error(buf: *mut c_char, msg: &str) {
    if buf.is_null() {
        return;
    }
    let max = RSBE_MAX_ERROR_LENGTH as usize - 1;
    let bytes: Vec<u8> = msg.bytes().take(max).collect();
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf as *mut u8, bytes.len());
        *buf.add(bytes.len()) = 0;
    }
}

unsafe fn malloc_copy<T: Copy>(src: &[T]) -> Result<*mut T> {
    let bytes = std::mem::size_of::<T>()
        .checked_mul(src.len())
        .ok_or(Error::Length)?;
    let p = libc::malloc(bytes.max(1) as size_t) as *mut T;
    if p.is_null() {
        return Err(Error::OutOfMemory);
    }
    std::ptr::copy_nonoverlapping(src.as_ptr(), p, src.len());
    Ok(p)
}

unsafe fn tables_from_entries(
    entries: *const TableEntry,
    len: c_int,
) -> Result<Vec<Arc<Table<f64>>>> {
    if len < 0 || (len > 0 && entries.is_null()) {
        return Err(Error::invalid("tables pointer is NULL"));
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    let entries = std::slice::from_raw_parts(entries, len as usize);
    let mut tables = Vec::with_capacity(entries.len());
    for (i, e) in entries.iter().enumerate() {
        if e.num_vars < 0 {
            return Err(Error::invalid(format!("table {} has negative num_vars", i)));
        }
        let n = e.num_vars as usize;
        if n > 0 && (e.vars.is_null() || e.dom_sizes.is_null()) {
            return Err(Error::invalid(format!("table {} has NULL scope data", i)));
        }
        let vars = std::slice::from_raw_parts(e.vars, n);
        let dom_sizes = std::slice::from_raw_parts(e.dom_sizes, n);

        let mut scope = Vec::with_capacity(n);
        let mut doms = Vec::with_capacity(n);
        let mut size = 1usize;
        for (&v, &d) in vars.iter().zip(dom_sizes.iter()) {
            if v < 0 {
                return Err(Error::invalid(format!("table {} has a negative variable", i)));
            }
            if d <= 0 {
                return Err(Error::invalid(format!(
                    "table {} has a non-positive domain size",
                    i
                )));
            }
            scope.push(VarLabel::new(v as u64));
            doms.push(d as usize);
            size = size.checked_mul(d as usize).ok_or(Error::Length)?;
        }
        if e.values.is_null() {
            return Err(Error::invalid(format!("table {} has NULL values", i)));
        }
        let values = std::slice::from_raw_parts(e.values, size);
        tables.push(Arc::new(Table::with_values(&scope, &doms, values.to_vec())?));
    }
    Ok(tables)
}

unsafe fn var_order_from_raw(
    var_order: *const c_int,
    len: c_int,
) -> Result<Vec<VarLabel>> {
    if len < 0 || (len > 0 && var_order.is_null()) {
        return Err(Error::invalid("variable order pointer is NULL"));
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    std::slice::from_raw_parts(var_order, len as usize)
        .iter()
        .map(|&v| {
            if v < 0 {
                Err(Error::invalid(
                    "elimination order contains a negative variable",
                ))
            } else {
                Ok(VarLabel::new(v as u64))
            }
        })
        .collect()
}

unsafe fn init_state_from_raw(
    init_state: *const c_int,
    len: c_int,
) -> Result<Option<Vec<DomIndex>>> {
    if init_state.is_null() || len == 0 {
        return Ok(None);
    }
    if len < 0 {
        return Err(Error::invalid("initState length is negative"));
    }
    std::slice::from_raw_parts(init_state, len as usize)
        .iter()
        .map(|&v| {
            if v < 0 {
                Err(Error::invalid("initState contains a negative entry"))
            } else {
                Ok(v as DomIndex)
            }
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn heuristic_from_code(code: c_int) -> Result<Heuristic> {
    match code {
        RSBE_HEURISTIC_MIN_DEG => Ok(Heuristic::MinDegree),
        RSBE_HEURISTIC_W_MIN_DEG => Ok(Heuristic::WeightedMinDegree),
        RSBE_HEURISTIC_MIN_FILL => Ok(Heuristic::MinFill),
        RSBE_HEURISTIC_W_MIN_FILL => Ok(Heuristic::WeightedMinFill),
        _ => Err(Error::invalid("invalid heuristic")),
    }
}

/// Compute an elimination order; see `solver::greedy_var_order`.
///
/// # Safety
/// All pointers must be valid for their declared lengths; `variable_order`
/// and `variable_order_len` must be writable; `error_message` must have
/// space for `RSBE_MAX_ERROR_LENGTH` bytes.
#[no_mangle]
pub unsafe extern "C" fn rsbe_greedy_var_order(
    tables: *const TableEntry,
    tables_len: c_int,
    max_complexity: c_double,
    clamp_ranks: *const c_int,
    clamp_ranks_len: c_int,
    heuristic: c_int,
    selection_scale: f32,
    variable_order: *mut *mut c_int,
    variable_order_len: *mut c_int,
    error_message: *mut c_char,
) -> c_int {
    if variable_order.is_null() || variable_order_len.is_null() {
        write_error(error_message, "variableOrder output pointer is NULL");
        return 1;
    }
    *variable_order = std::ptr::null_mut();
    *variable_order_len = 0;

    let result = (|| -> Result<Vec<VarLabel>> {
        let tables = tables_from_entries(tables, tables_len)?;
        let h = heuristic_from_code(heuristic)?;
        let ranks: Option<Vec<i32>> = if clamp_ranks.is_null() || clamp_ranks_len == 0 {
            None
        } else {
            if clamp_ranks_len < 0 {
                return Err(Error::invalid("clampRanks length is negative"));
            }
            Some(std::slice::from_raw_parts(clamp_ranks, clamp_ranks_len as usize).to_vec())
        };
        let mut rng = rand::thread_rng();
        let mut draw = move || rng.gen::<f64>();
        solver::greedy_var_order(
            &tables,
            max_complexity,
            ranks.as_deref(),
            h,
            selection_scale,
            &mut draw,
        )
    })();

    match result {
        Ok(order) => {
            let ints: Vec<c_int> = order.iter().map(|v| v.value() as c_int).collect();
            match malloc_copy(&ints) {
                Ok(p) => {
                    *variable_order = p;
                    *variable_order_len = ints.len() as c_int;
                    0
                }
                Err(e) => {
                    write_error(error_message, &e.to_string());
                    1
                }
            }
        }
        Err(e) => {
            write_error(error_message, &e.to_string());
            1
        }
    }
}

/// Find the lowest-energy values and states; see `solver::optimize`.
///
/// # Safety
/// See [`rsbe_greedy_var_order`].
#[no_mangle]
pub unsafe extern "C" fn rsbe_optimize(
    tables: *const TableEntry,
    tables_len: c_int,
    variable_order: *const c_int,
    variable_order_len: c_int,
    max_complexity: c_double,
    max_solutions: c_int,
    init_state: *const c_int,
    init_state_len: c_int,
    min_vars: c_int,
    energies: *mut *mut c_double,
    energies_len: *mut c_int,
    states: *mut *mut c_int,
    state_len: *mut c_int,
    error_message: *mut c_char,
) -> c_int {
    if energies.is_null() || energies_len.is_null() || states.is_null() || state_len.is_null() {
        write_error(error_message, "output pointer is NULL");
        return 1;
    }
    *energies = std::ptr::null_mut();
    *energies_len = 0;
    *states = std::ptr::null_mut();
    *state_len = 0;

    let result = (|| -> Result<(Vec<f64>, Vec<c_int>, usize)> {
        let tables = tables_from_entries(tables, tables_len)?;
        let order = var_order_from_raw(variable_order, variable_order_len)?;
        let x0 = init_state_from_raw(init_state, init_state_len)?;
        if max_solutions < 0 {
            return Err(Error::invalid("maxSolutions is negative"));
        }
        if min_vars < 0 {
            return Err(Error::invalid("minVars is negative"));
        }
        let res = solver::optimize(
            &tables,
            &order,
            max_complexity,
            max_solutions as usize,
            x0.as_deref(),
            min_vars as usize,
        )?;
        let num_vars = res.solutions.first().map_or(0, |s| s.len());
        let mut flat = Vec::with_capacity(res.solutions.len() * num_vars);
        for s in &res.solutions {
            flat.extend(s.iter().map(|&d| d as c_int));
        }
        Ok((res.energies, flat, num_vars))
    })();

    match result {
        Ok((energy_vec, flat_states, num_vars)) => {
            let ep = match malloc_copy(&energy_vec) {
                Ok(p) => p,
                Err(e) => {
                    write_error(error_message, &e.to_string());
                    return 1;
                }
            };
            let sp = match malloc_copy(&flat_states) {
                Ok(p) => p,
                Err(e) => {
                    libc::free(ep as *mut libc::c_void);
                    write_error(error_message, &e.to_string());
                    return 1;
                }
            };
            *energies = ep;
            *energies_len = energy_vec.len() as c_int;
            *states = sp;
            *state_len = num_vars as c_int;
            0
        }
        Err(e) => {
            write_error(error_message, &e.to_string());
            1
        }
    }
}

/// Sample from `p(x) ∝ exp(Σ T(x))`, returning the log partition function,
/// samples, and optionally marginals; see `solver::sample`. A negative
/// `seed` seeds from entropy.
///
/// # Safety
/// See [`rsbe_greedy_var_order`].
#[no_mangle]
pub unsafe extern "C" fn rsbe_sample(
    tables: *const TableEntry,
    tables_len: c_int,
    variable_order: *const c_int,
    variable_order_len: c_int,
    max_complexity: c_double,
    sample_num: c_int,
    init_state: *const c_int,
    init_state_len: c_int,
    min_vars: c_int,
    seed: c_longlong,
    return_marginals: c_int,
    log_pf: *mut c_double,
    samples: *mut *mut c_int,
    sample_len: *mut c_int,
    marginals: *mut *mut Marginal,
    marginals_len: *mut c_int,
    error_message: *mut c_char,
) -> c_int {
    if log_pf.is_null()
        || samples.is_null()
        || sample_len.is_null()
        || marginals.is_null()
        || marginals_len.is_null()
    {
        write_error(error_message, "output pointer is NULL");
        return 1;
    }
    *log_pf = 0.0;
    *samples = std::ptr::null_mut();
    *sample_len = 0;
    *marginals = std::ptr::null_mut();
    *marginals_len = 0;

    let result = (|| -> Result<solver::SampleResult> {
        let tables = tables_from_entries(tables, tables_len)?;
        let order = var_order_from_raw(variable_order, variable_order_len)?;
        let x0 = init_state_from_raw(init_state, init_state_len)?;
        if sample_num < 0 {
            return Err(Error::invalid("sampleNum is negative"));
        }
        if min_vars < 0 {
            return Err(Error::invalid("minVars is negative"));
        }
        solver::sample(
            &tables,
            &order,
            max_complexity,
            sample_num as usize,
            x0.as_deref(),
            min_vars as usize,
            if seed >= 0 { Some(seed as u64) } else { None },
            return_marginals != 0,
            None,
        )
    })();

    let res = match result {
        Ok(res) => res,
        Err(e) => {
            write_error(error_message, &e.to_string());
            return 1;
        }
    };

    let num_vars = res.samples.first().map_or(0, |s| s.len());
    let mut flat = Vec::with_capacity(res.samples.len() * num_vars);
    for s in &res.samples {
        flat.extend(s.iter().map(|&d| d as c_int));
    }
    let sp = match malloc_copy(&flat) {
        Ok(p) => p,
        Err(e) => {
            write_error(error_message, &e.to_string());
            return 1;
        }
    };

    let entries = res.marginals.as_deref().unwrap_or(&[]);
    match pack_marginals(entries) {
        Ok((mp, mlen)) => {
            *log_pf = res.log_pf;
            *samples = sp;
            *sample_len = num_vars as c_int;
            *marginals = mp;
            *marginals_len = mlen;
            0
        }
        Err(e) => {
            libc::free(sp as *mut libc::c_void);
            write_error(error_message, &e.to_string());
            1
        }
    }
}

unsafe fn pack_marginals(entries: &[MarginalEntry]) -> Result<(*mut Marginal, c_int)> {
    if entries.is_empty() {
        return Ok((std::ptr::null_mut(), 0));
    }
    let bytes = std::mem::size_of::<Marginal>()
        .checked_mul(entries.len())
        .ok_or(Error::Length)?;
    let array = libc::malloc(bytes as size_t) as *mut Marginal;
    if array.is_null() {
        return Err(Error::OutOfMemory);
    }

    for (i, entry) in entries.iter().enumerate() {
        let vars: Vec<c_int> = entry.vars.iter().map(|v| v.value() as c_int).collect();
        let vars_ptr = match malloc_copy(&vars) {
            Ok(p) => p,
            Err(e) => {
                rsbe_free_marginals(array, i as c_int);
                return Err(e);
            }
        };
        let values_ptr = match malloc_copy(&entry.values) {
            Ok(p) => p,
            Err(e) => {
                libc::free(vars_ptr as *mut libc::c_void);
                rsbe_free_marginals(array, i as c_int);
                return Err(e);
            }
        };
        array.add(i).write(Marginal {
            vars_len: vars.len() as c_int,
            vars: vars_ptr,
            values_len: entry.values.len() as c_int,
            values: values_ptr,
        });
    }
    Ok((array, entries.len() as c_int))
}

/// # Safety
/// `var_order` must come from [`rsbe_greedy_var_order`] or be NULL.
#[no_mangle]
pub unsafe extern "C" fn rsbe_free_var_order(var_order: *mut c_int) {
    if !var_order.is_null() {
        libc::free(var_order as *mut libc::c_void);
    }
}

/// # Safety
/// `energies` must come from [`rsbe_optimize`] or be NULL.
#[no_mangle]
pub unsafe extern "C" fn rsbe_free_energies(energies: *mut c_double) {
    if !energies.is_null() {
        libc::free(energies as *mut libc::c_void);
    }
}

/// # Safety
/// `states` must come from [`rsbe_optimize`] or be NULL.
#[no_mangle]
pub unsafe extern "C" fn rsbe_free_states(states: *mut c_int) {
    if !states.is_null() {
        libc::free(states as *mut libc::c_void);
    }
}

/// # Safety
/// `samples` must come from [`rsbe_sample`] or be NULL.
#[no_mangle]
pub unsafe extern "C" fn rsbe_free_samples(samples: *mut c_int) {
    if !samples.is_null() {
        libc::free(samples as *mut libc::c_void);
    }
}

/// # Safety
/// `marginals` must come from [`rsbe_sample`] (with the matching length) or
/// be NULL.
#[no_mangle]
pub unsafe extern "C" fn rsbe_free_marginals(marginals: *mut Marginal, marginals_len: c_int) {
    if marginals.is_null() {
        return;
    }
    for i in 0..marginals_len.max(0) as usize {
        let m = &*marginals.add(i);
        if !m.vars.is_null() {
            libc::free(m.vars as *mut libc::c_void);
        }
        if !m.values.is_null() {
            libc::free(m.values as *mut libc::c_void);
        }
    }
    libc::free(marginals as *mut libc::c_void);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_round_trip_through_the_c_surface() {
        // one unary table over variable 0 with values (3, -1)
        let vars = [0 as c_int];
        let doms = [2 as c_int];
        let values = [3.0, -1.0];
        let entry = TableEntry {
            num_vars: 1,
            vars: vars.as_ptr(),
            dom_sizes: doms.as_ptr(),
            values: values.as_ptr(),
        };
        let order = [0 as c_int];

        let mut energies: *mut c_double = std::ptr::null_mut();
        let mut energies_len: c_int = 0;
        let mut states: *mut c_int = std::ptr::null_mut();
        let mut state_len: c_int = 0;
        let mut err = [0 as c_char; 200];

        let status = unsafe {
            rsbe_optimize(
                &entry,
                1,
                order.as_ptr(),
                1,
                2.0,
                1,
                std::ptr::null(),
                0,
                0,
                &mut energies,
                &mut energies_len,
                &mut states,
                &mut state_len,
                err.as_mut_ptr(),
            )
        };
        assert_eq!(status, 0);
        assert_eq!(energies_len, 1);
        assert_eq!(state_len, 1);
        unsafe {
            assert_eq!(*energies, -1.0);
            assert_eq!(*states, 1);
            rsbe_free_energies(energies);
            rsbe_free_states(states);
        }
    }

    #[test]
    fn errors_fill_the_message_buffer() {
        let order = [5 as c_int];
        let mut energies: *mut c_double = std::ptr::null_mut();
        let mut energies_len: c_int = 0;
        let mut states: *mut c_int = std::ptr::null_mut();
        let mut state_len: c_int = 0;
        let mut err = [0 as c_char; 200];

        let status = unsafe {
            rsbe_optimize(
                std::ptr::null(),
                0,
                order.as_ptr(),
                1,
                2.0,
                0,
                std::ptr::null(),
                0,
                0,
                &mut energies,
                &mut energies_len,
                &mut states,
                &mut state_len,
                err.as_mut_ptr(),
            )
        };
        assert_eq!(status, 1);
        assert!(states.is_null());
        let msg = unsafe { std::ffi::CStr::from_ptr(err.as_ptr()) };
        assert!(!msg.to_bytes().is_empty());
    }

    #[test]
    fn frees_accept_null() {
        unsafe {
            rsbe_free_var_order(std::ptr::null_mut());
            rsbe_free_energies(std::ptr::null_mut());
            rsbe_free_states(std::ptr::null_mut());
            rsbe_free_samples(std::ptr::null_mut());
            rsbe_free_marginals(std::ptr::null_mut(), 0);
        }
    }
}
