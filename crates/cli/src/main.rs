use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hs_core::{
    CoreConfig, Employee, EmployeeOrder, EmployeePatch, Hospital, Patient, PatientOrder,
    PatientPatch, Person, PersonPatch, RecordId, SnapshotStatus, Treatment, TreatmentOrder,
    TreatmentPatch, ValidationError, Ward, WardCensus, WardOrder, WardPatch,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "healthsphere")]
#[command(about = "HealthSphere hospital records CLI")]
struct Cli {
    /// Snapshot directory (overrides HEALTHSPHERE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage wards
    #[command(subcommand)]
    Ward(WardCommand),
    /// Manage patients
    #[command(subcommand)]
    Patient(PatientCommand),
    /// Manage employees
    #[command(subcommand)]
    Employee(EmployeeCommand),
    /// Manage treatments
    #[command(subcommand)]
    Treatment(TreatmentCommand),
}

#[derive(Subcommand)]
enum WardCommand {
    /// Add a ward
    Add {
        /// Ward id (next free id if omitted)
        #[arg(long)]
        id: Option<RecordId>,
        #[arg(long)]
        name: String,
        /// Number of patient places (1-100)
        #[arg(long)]
        capacity: u32,
        #[arg(long)]
        description: Option<String>,
    },
    /// List wards
    List {
        #[arg(long, value_enum, default_value_t = WardListOrder::Canonical)]
        order: WardListOrder,
    },
    /// Show one ward with its census
    Show { id: RecordId },
    /// Update a ward
    Update {
        id: RecordId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        capacity: Option<u32>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a ward
    Delete { id: RecordId },
    /// Occupancy of every ward
    Census,
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Add a patient
    Add {
        #[command(flatten)]
        person: NewPerson,
        /// Ward to admit the patient to
        #[arg(long)]
        ward: Option<RecordId>,
    },
    /// List patients
    List {
        #[arg(long, value_enum, default_value_t = PatientListOrder::Canonical)]
        order: PatientListOrder,
    },
    /// Show one patient with their treatments
    Show { id: RecordId },
    /// Update a patient
    Update {
        id: RecordId,
        #[command(flatten)]
        person: PersonUpdate,
        /// Move the patient to this ward
        #[arg(long, conflicts_with = "discharge")]
        ward: Option<RecordId>,
        /// Remove the patient from their ward
        #[arg(long)]
        discharge: bool,
    },
    /// Delete a patient
    Delete { id: RecordId },
}

#[derive(Subcommand)]
enum EmployeeCommand {
    /// Add an employee
    Add {
        #[command(flatten)]
        person: NewPerson,
        #[arg(long)]
        department: String,
        /// Ward the employee works on
        #[arg(long)]
        ward: Option<RecordId>,
    },
    /// List employees
    List {
        #[arg(long, value_enum, default_value_t = EmployeeListOrder::Canonical)]
        order: EmployeeListOrder,
    },
    /// Show one employee
    Show { id: RecordId },
    /// Update an employee
    Update {
        id: RecordId,
        #[command(flatten)]
        person: PersonUpdate,
        #[arg(long)]
        department: Option<String>,
        #[arg(long, conflicts_with = "unassign")]
        ward: Option<RecordId>,
        /// Clear the employee's ward
        #[arg(long)]
        unassign: bool,
    },
    /// Delete an employee
    Delete { id: RecordId },
}

#[derive(Subcommand)]
enum TreatmentCommand {
    /// Record a treatment
    Add {
        #[arg(long)]
        id: Option<RecordId>,
        /// Date of treatment (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        therapy: String,
        /// Patient id
        #[arg(long)]
        patient: RecordId,
        /// Doctor (employee) id
        #[arg(long)]
        doctor: RecordId,
    },
    /// List treatments
    List {
        #[arg(long, value_enum, default_value_t = TreatmentListOrder::Canonical)]
        order: TreatmentListOrder,
    },
    /// Show one treatment with patient and doctor names
    Show { id: RecordId },
    /// Update a treatment
    Update {
        id: RecordId,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        therapy: Option<String>,
        #[arg(long)]
        patient: Option<RecordId>,
        #[arg(long)]
        doctor: Option<RecordId>,
    },
    /// Delete a treatment
    Delete { id: RecordId },
}

#[derive(Args)]
struct NewPerson {
    /// Person id (next free id if omitted)
    #[arg(long)]
    id: Option<RecordId>,
    /// Family name
    #[arg(long)]
    name: String,
    #[arg(long)]
    firstname: String,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    birthdate: NaiveDate,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    address: Option<String>,
}

#[derive(Args)]
struct PersonUpdate {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    firstname: Option<String>,
    #[arg(long)]
    birthdate: Option<NaiveDate>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    address: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum WardListOrder {
    Canonical,
    Capacity,
    Name,
    Occupancy,
}

#[derive(Clone, Copy, ValueEnum)]
enum PatientListOrder {
    Canonical,
    Age,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmployeeListOrder {
    Canonical,
    Ward,
}

#[derive(Clone, Copy, ValueEnum)]
enum TreatmentListOrder {
    Canonical,
    DateDesc,
    DateAsc,
    Therapy,
    Patient,
}

impl NewPerson {
    fn build(&self, id: RecordId) -> Result<Person, ValidationError> {
        let mut person = Person::new(id, &self.name, &self.firstname, self.birthdate)?;
        if let Some(phone) = &self.phone {
            person = person.with_phone(phone);
        }
        if let Some(email) = &self.email {
            person = person.with_email(email)?;
        }
        if let Some(address) = &self.address {
            person = person.with_address(address);
        }
        Ok(person)
    }
}

impl From<PersonUpdate> for PersonPatch {
    fn from(update: PersonUpdate) -> Self {
        PersonPatch {
            name: update.name,
            firstname: update.firstname,
            phone: update.phone,
            email: update.email,
            address: update.address,
            birthdate: update.birthdate,
        }
    }
}

/// `Some(None)` clears, `Some(Some(id))` assigns, `None` leaves the ward alone.
fn ward_change(ward: Option<RecordId>, clear: bool) -> Option<Option<RecordId>> {
    if clear {
        Some(None)
    } else {
        ward.map(Some)
    }
}

fn report(action: &str, kind: &str, id: RecordId, status: SnapshotStatus) {
    println!("{action} {kind} {id}");
    match status {
        SnapshotStatus::Degraded(e) => eprintln!("Warning: change not persisted: {e}"),
        SnapshotStatus::Deferred => eprintln!("Note: auto-persistence is off; change kept in memory"),
        SnapshotStatus::Saved | SnapshotStatus::NotBound => {}
    }
}

fn optional(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn print_ward(ward: &Ward) {
    println!(
        "ID: {}, Name: {}, Capacity: {}, Description: {}",
        ward.id,
        ward.name,
        ward.capacity,
        optional(ward.description.as_deref())
    );
}

fn print_census(census: &WardCensus) {
    println!(
        "ID: {}, Name: {}, {}",
        census.ward.id,
        census.ward.name,
        census.status_line()
    );
}

fn print_person(person: &Person, extra: &str) {
    println!(
        "ID: {}, Name: {}, Age: {}, Born: {}, Phone: {}, Email: {}, Address: {}{}",
        person.id,
        person.display_name(),
        person.age_on(today()),
        person.birthdate,
        optional(person.phone.as_deref()),
        optional(person.email.as_ref().map(|e| e.as_str())),
        optional(person.address.as_deref()),
        extra
    );
}

fn print_patient(patient: &Patient) {
    let ward = patient
        .ward_id
        .map_or_else(|| "none".to_string(), |id| id.to_string());
    print_person(&patient.person, &format!(", Ward: {ward}"));
}

fn print_employee(employee: &Employee) {
    let ward = employee
        .ward_id
        .map_or_else(|| "none".to_string(), |id| id.to_string());
    print_person(
        &employee.person,
        &format!(", Department: {}, Ward: {ward}", employee.department),
    );
}

fn print_treatment(treatment: &Treatment) {
    println!(
        "ID: {}, Date: {}, Therapy: {}, Patient: {}, Doctor: {}",
        treatment.id, treatment.date, treatment.therapy, treatment.patient_id, treatment.doctor_id
    );
}

fn print_all<T>(records: &[T], empty: &str, print: impl Fn(&T)) {
    if records.is_empty() {
        println!("{empty}");
    } else {
        records.iter().for_each(print);
    }
}

fn run_ward(hospital: &Hospital, command: WardCommand) -> anyhow::Result<()> {
    let wards = hospital.wards();
    match command {
        WardCommand::Add {
            id,
            name,
            capacity,
            description,
        } => {
            let build = |id: RecordId| -> Result<Ward, ValidationError> {
                let ward = Ward::new(id, &name, capacity)?;
                Ok(match &description {
                    Some(d) => ward.with_description(d),
                    None => ward,
                })
            };
            let (id, status) = match id {
                Some(id) => (id, wards.add(build(id)?)?),
                None => wards.add_with_next_id(build)?,
            };
            report("Added", "ward", id, status);
        }
        WardCommand::List { order } => {
            if let WardListOrder::Occupancy = order {
                print_all(&hospital.census_by_occupancy_rate(), "No wards found.", print_census);
                return Ok(());
            }
            let order = match order {
                WardListOrder::Capacity => WardOrder::CapacityDescending,
                WardListOrder::Name => WardOrder::Name,
                _ => WardOrder::Canonical,
            };
            print_all(
                &wards.sorted_by(|a, b| order.compare(a, b)),
                "No wards found.",
                print_ward,
            );
        }
        WardCommand::Show { id } => {
            let census = hospital.ward_census(id)?;
            print_ward(&census.ward);
            println!("{}", census.status_line());
            println!("Occupancy rate: {:.1}%", census.occupancy_rate());
            for patient in &census.patients {
                println!("  - {} (ID: {})", patient, patient.id);
            }
        }
        WardCommand::Update {
            id,
            name,
            capacity,
            description,
        } => {
            let patch = WardPatch {
                name,
                description,
                capacity,
            };
            report("Updated", "ward", id, wards.update_patch(id, &patch)?);
        }
        WardCommand::Delete { id } => {
            report("Deleted", "ward", id, wards.delete(id)?);
        }
        WardCommand::Census => {
            print_all(&hospital.census(), "No wards found.", print_census);
        }
    }
    Ok(())
}

fn run_patient(hospital: &Hospital, command: PatientCommand) -> anyhow::Result<()> {
    let patients = hospital.patients();
    match command {
        PatientCommand::Add { person, ward } => {
            let build = |id: RecordId| -> Result<Patient, ValidationError> {
                let patient = Patient::new(person.build(id)?);
                Ok(match ward {
                    Some(ward) => patient.with_ward(ward),
                    None => patient,
                })
            };
            let (id, status) = match person.id {
                Some(id) => (id, patients.add(build(id)?)?),
                None => patients.add_with_next_id(build)?,
            };
            report("Added", "patient", id, status);
        }
        PatientCommand::List { order } => {
            let order = match order {
                PatientListOrder::Canonical => PatientOrder::Canonical,
                PatientListOrder::Age => PatientOrder::AgeDescending,
            };
            let today = today();
            print_all(
                &patients.sorted_by(|a, b| order.compare(a, b, today)),
                "No patients found.",
                print_patient,
            );
        }
        PatientCommand::Show { id } => {
            print_patient(&patients.find_by_id(id)?);
            for treatment in hospital.treatments_for_patient(id)? {
                print!("  - ");
                print_treatment(&treatment);
            }
        }
        PatientCommand::Update {
            id,
            person,
            ward,
            discharge,
        } => {
            let patch = PatientPatch {
                person: person.into(),
                ward_id: ward_change(ward, discharge),
            };
            report("Updated", "patient", id, patients.update_patch(id, &patch)?);
        }
        PatientCommand::Delete { id } => {
            report("Deleted", "patient", id, patients.delete(id)?);
        }
    }
    Ok(())
}

fn run_employee(hospital: &Hospital, command: EmployeeCommand) -> anyhow::Result<()> {
    let employees = hospital.employees();
    match command {
        EmployeeCommand::Add {
            person,
            department,
            ward,
        } => {
            let build = |id: RecordId| -> Result<Employee, ValidationError> {
                let employee = Employee::new(person.build(id)?, &department)?;
                Ok(match ward {
                    Some(ward) => employee.with_ward(ward),
                    None => employee,
                })
            };
            let (id, status) = match person.id {
                Some(id) => (id, employees.add(build(id)?)?),
                None => employees.add_with_next_id(build)?,
            };
            report("Added", "employee", id, status);
        }
        EmployeeCommand::List { order } => {
            let order = match order {
                EmployeeListOrder::Canonical => EmployeeOrder::Canonical,
                EmployeeListOrder::Ward => EmployeeOrder::WardThenDepartment,
            };
            let today = today();
            print_all(
                &employees.sorted_by(|a, b| order.compare(a, b, today)),
                "No employees found.",
                print_employee,
            );
        }
        EmployeeCommand::Show { id } => print_employee(&employees.find_by_id(id)?),
        EmployeeCommand::Update {
            id,
            person,
            department,
            ward,
            unassign,
        } => {
            let patch = EmployeePatch {
                person: person.into(),
                department,
                ward_id: ward_change(ward, unassign),
            };
            report("Updated", "employee", id, employees.update_patch(id, &patch)?);
        }
        EmployeeCommand::Delete { id } => {
            report("Deleted", "employee", id, employees.delete(id)?);
        }
    }
    Ok(())
}

fn run_treatment(hospital: &Hospital, command: TreatmentCommand) -> anyhow::Result<()> {
    let treatments = hospital.treatments();
    match command {
        TreatmentCommand::Add {
            id,
            date,
            therapy,
            patient,
            doctor,
        } => {
            let build = |id: RecordId| Treatment::new(id, date, &therapy, patient, doctor);
            let (id, status) = match id {
                Some(id) => (id, treatments.add(build(id))?),
                None => treatments.add_with_next_id(|id| Ok(build(id)))?,
            };
            report("Added", "treatment", id, status);
        }
        TreatmentCommand::List { order } => {
            let order = match order {
                TreatmentListOrder::Canonical => TreatmentOrder::Canonical,
                TreatmentListOrder::DateDesc => TreatmentOrder::DateDescending,
                TreatmentListOrder::DateAsc => TreatmentOrder::DateAscending,
                TreatmentListOrder::Therapy => TreatmentOrder::Therapy,
                TreatmentListOrder::Patient => TreatmentOrder::PatientThenDate,
            };
            print_all(
                &treatments.sorted_by(|a, b| order.compare(a, b)),
                "No treatments found.",
                print_treatment,
            );
        }
        TreatmentCommand::Show { id } => {
            let view = hospital.resolve_treatment(id)?;
            print_treatment(&view.treatment);
            println!("  Patient: {}", view.patient);
            println!("  Doctor: {}", view.doctor);
        }
        TreatmentCommand::Update {
            id,
            date,
            therapy,
            patient,
            doctor,
        } => {
            let patch = TreatmentPatch {
                date,
                therapy,
                patient_id: patient,
                doctor_id: doctor,
            };
            report("Updated", "treatment", id, treatments.update_patch(id, &patch)?);
        }
        TreatmentCommand::Delete { id } => {
            report("Deleted", "treatment", id, treatments.delete(id)?);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hs_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut cfg = CoreConfig::from_env_values(
        std::env::var("HEALTHSPHERE_DATA_DIR").ok(),
        std::env::var("HEALTHSPHERE_SNAPSHOT_FORMAT").ok(),
        std::env::var("HEALTHSPHERE_AUTOSAVE").ok(),
    )?;
    if let Some(data_dir) = cli.data_dir {
        cfg = cfg.with_data_dir(data_dir)?;
    }

    let hospital = Hospital::open(Arc::new(cfg)).context("failed to open hospital records")?;
    tracing::debug!(?hospital, "registries ready");

    match cli.command {
        Commands::Ward(command) => run_ward(&hospital, command),
        Commands::Patient(command) => run_patient(&hospital, command),
        Commands::Employee(command) => run_employee(&hospital, command),
        Commands::Treatment(command) => run_treatment(&hospital, command),
    }
}
